pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{
    ReportOptions, describe_failure, format_folder_list, parse_url_line, resolve_options,
    sitemap_url,
};
