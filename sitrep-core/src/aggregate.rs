// Aggregations over a dataset view

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::dataset::EnrichedRecord;

/// Content-type selection driving duplicate detection and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentFilter {
    #[default]
    All,
    HtmlOnly,
    ImagesOnly,
}

impl ContentFilter {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "all" => Some(ContentFilter::All),
            "html" | "html-only" => Some(ContentFilter::HtmlOnly),
            "images" | "image" | "images-only" => Some(ContentFilter::ImagesOnly),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentFilter::All => "All",
            ContentFilter::HtmlOnly => "HTML",
            ContentFilter::ImagesOnly => "Images",
        }
    }

    /// Whether a record stays in a view restricted to this content type.
    pub fn keeps(&self, record: &EnrichedRecord) -> bool {
        match self {
            ContentFilter::All => true,
            ContentFilter::HtmlOnly => record.is_html(),
            ContentFilter::ImagesOnly => record.has_images(),
        }
    }
}

/// One image location and the page that lists it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOccurrence {
    pub image: String,
    pub page_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub duplicate_url_records: Vec<EnrichedRecord>,
    pub duplicate_image_records: Vec<ImageOccurrence>,
    /// Every member of every duplicate group
    pub total_count: usize,
    /// URL occurrences beyond the first of each URL
    pub excess_url_count: usize,
    /// Image occurrences beyond the first of each image
    pub excess_image_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetrics {
    pub filter: ContentFilter,
    pub total_records: usize,
    pub html_count: usize,
    pub image_count: usize,
    /// Count the percentages refer to
    pub combined_count: usize,
    pub html_percentage: f64,
    pub image_percentage: f64,
    /// Average image occurrences per record, not capped
    pub images_per_record: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Year,
    MonthYear,
    Day,
}

impl Granularity {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "year" => Some(Granularity::Year),
            "month" | "month-year" | "monthyear" => Some(Granularity::MonthYear),
            "day" => Some(Granularity::Day),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Granularity::Year => "Year",
            Granularity::MonthYear => "Month-Year",
            Granularity::Day => "Day",
        }
    }

    fn bucket(&self, at: &NaiveDateTime) -> (i32, u32, u32) {
        match self {
            Granularity::Year => (at.year(), 0, 0),
            Granularity::MonthYear => (at.year(), at.month(), 0),
            Granularity::Day => (at.year(), at.month(), at.day()),
        }
    }

    fn key(&self, (year, month, day): (i32, u32, u32)) -> String {
        match self {
            Granularity::Year => format!("{year:04}"),
            Granularity::MonthYear => format!("{year:04}-{month:02}"),
            Granularity::Day => format!("{year:04}-{month:02}-{day:02}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodCount {
    pub period: String,
    pub count: usize,
}

/// Record counts per lastmod period, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    pub granularity: Granularity,
    pub periods: Vec<PeriodCount>,
    /// Records with a lastmod
    pub resolved: usize,
    /// Records without a usable lastmod
    pub unresolved: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCount {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastmodCoverage {
    pub with_lastmod: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Records sharing a page URL and image locations listed more than once.
///
/// Every member of a duplicate group is reported, sorted by the grouping key.
pub fn find_duplicates(records: &[&EnrichedRecord], filter: ContentFilter) -> DuplicateReport {
    let duplicate_url_records = match filter {
        ContentFilter::HtmlOnly => {
            let html: Vec<&EnrichedRecord> = records.iter().copied().filter(|r| r.is_html()).collect();
            duplicate_urls(&html)
        }
        ContentFilter::All => duplicate_urls(records),
        ContentFilter::ImagesOnly => Vec::new(),
    };

    let duplicate_image_records = match filter {
        ContentFilter::HtmlOnly => Vec::new(),
        ContentFilter::All | ContentFilter::ImagesOnly => duplicate_images(records),
    };

    let total_count = duplicate_url_records.len() + duplicate_image_records.len();
    let excess_url_count = excess(duplicate_url_records.iter().map(|r| r.url()));
    let excess_image_count = excess(duplicate_image_records.iter().map(|o| o.image.as_str()));
    DuplicateReport {
        duplicate_url_records,
        duplicate_image_records,
        total_count,
        excess_url_count,
        excess_image_count,
    }
}

/// Occurrences minus distinct values.
fn excess<'a>(keys: impl Iterator<Item = &'a str>) -> usize {
    let mut total = 0;
    let mut distinct = HashSet::new();
    for key in keys {
        total += 1;
        distinct.insert(key);
    }
    total - distinct.len()
}

fn duplicate_urls(records: &[&EnrichedRecord]) -> Vec<EnrichedRecord> {
    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *occurrences.entry(record.url()).or_default() += 1;
    }

    let mut duplicates: Vec<EnrichedRecord> = records
        .iter()
        .filter(|r| occurrences[r.url()] > 1)
        .map(|r| (*r).clone())
        .collect();
    duplicates.sort_by(|a, b| a.url().cmp(b.url()));
    duplicates
}

fn duplicate_images(records: &[&EnrichedRecord]) -> Vec<ImageOccurrence> {
    let pairs: Vec<(&str, &str)> = records
        .iter()
        .flat_map(|r| r.images().map(move |image| (image, r.url())))
        .collect();

    let mut occurrences: HashMap<&str, usize> = HashMap::new();
    for (image, _) in &pairs {
        *occurrences.entry(*image).or_default() += 1;
    }

    let mut duplicates: Vec<ImageOccurrence> = pairs
        .into_iter()
        .filter(|(image, _)| occurrences[image] > 1)
        .map(|(image, page_url)| ImageOccurrence {
            image: image.to_string(),
            page_url: page_url.to_string(),
        })
        .collect();
    duplicates.sort_by(|a, b| a.image.cmp(&b.image));
    duplicates
}

pub fn summarize_counts(records: &[&EnrichedRecord], filter: ContentFilter) -> ContentMetrics {
    let total_records = records.len();
    let html = records.iter().filter(|r| r.is_html()).count();
    let images: usize = records.iter().map(|r| r.images().count()).sum();
    let images_per_record = ratio(images, total_records);

    let (html_count, image_count, combined_count, html_percentage, image_percentage) = match filter {
        ContentFilter::HtmlOnly => (html, 0, html, percentage(html, total_records), 0.0),
        ContentFilter::ImagesOnly => (0, images, images, 0.0, percentage(images, total_records)),
        ContentFilter::All => {
            let combined = html + images;
            (
                html,
                images,
                combined,
                percentage(html, combined),
                percentage(images, combined),
            )
        }
    };

    ContentMetrics {
        filter,
        total_records,
        html_count,
        image_count,
        combined_count,
        html_percentage,
        image_percentage,
        images_per_record,
    }
}

fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Share of `part` in `whole`, in `[0, 100]`.
fn percentage(part: usize, whole: usize) -> f64 {
    (ratio(part, whole) * 100.0).min(100.0)
}

pub fn group_by_period(records: &[&EnrichedRecord], granularity: Granularity) -> Timeline {
    let mut buckets: BTreeMap<(i32, u32, u32), usize> = BTreeMap::new();
    let mut unresolved = 0;

    for record in records {
        match record.lastmod() {
            Some(at) => *buckets.entry(granularity.bucket(at)).or_default() += 1,
            None => unresolved += 1,
        }
    }

    let resolved = buckets.values().sum();
    let periods = buckets
        .into_iter()
        .map(|(bucket, count)| PeriodCount {
            period: granularity.key(bucket),
            count,
        })
        .collect();

    Timeline {
        granularity,
        periods,
        resolved,
        unresolved,
    }
}

pub fn count_by_extension(records: &[&EnrichedRecord]) -> Vec<FacetCount> {
    count_by(records, |r| r.facets.file_extension.as_str())
}

pub fn count_by_domain(records: &[&EnrichedRecord]) -> Vec<FacetCount> {
    count_by(records, |r| r.facets.domain.as_str())
}

pub fn count_by_first_folder(records: &[&EnrichedRecord]) -> Vec<FacetCount> {
    count_by(records, |r| r.facets.first_folder.as_str())
}

fn count_by<'a, F>(records: &[&'a EnrichedRecord], key: F) -> Vec<FacetCount>
where
    F: Fn(&'a EnrichedRecord) -> &'a str,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for record in records {
        *counts.entry(key(*record)).or_default() += 1;
    }

    let mut counts: Vec<FacetCount> = counts
        .into_iter()
        .map(|(key, count)| FacetCount {
            key: key.to_string(),
            count,
        })
        .collect();
    counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    counts
}

pub fn lastmod_coverage(records: &[&EnrichedRecord]) -> LastmodCoverage {
    let with_lastmod = records.iter().filter(|r| r.lastmod().is_some()).count();
    LastmodCoverage {
        with_lastmod,
        total: records.len(),
        percentage: percentage(with_lastmod, records.len()),
    }
}
