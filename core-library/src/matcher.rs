//! Album matching
//!
//! Applies the compiled album rules to the metadata of the local collection
//! and produces the desired membership of every album for this run.

use bridge_traits::metadata::MetadataRecord;
use core_runtime::config::CoreConfig;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::photo::{shorten_path, Photo};
use crate::rules::{AlbumRuleSet, CompiledRule};
use crate::time_resolver::TimeResolver;

/// Album name to desired photo set
///
/// Every configured album has an entry, possibly with an empty set.
pub type AlbumMembership = BTreeMap<String, HashSet<Photo>>;

/// Matches local photos against album rules
pub struct Matcher {
    rules: Vec<CompiledRule>,
    shortener: Regex,
    fallback_offset: chrono::FixedOffset,
}

impl Matcher {
    /// Compile the rule set; fails on any configuration problem before matching starts.
    pub fn new(rules: &AlbumRuleSet, config: &CoreConfig) -> Result<Self> {
        Ok(Self {
            rules: rules.compile()?,
            shortener: config.path_shortening_regex()?,
            fallback_offset: config.fallback_utc_offset,
        })
    }

    /// Short path of a local file
    pub fn short_path(&self, full_path: &Path) -> String {
        shorten_path(full_path, &self.shortener)
    }

    /// Compute the desired membership of every album.
    ///
    /// Records are processed in input order. A capture time is resolved only for
    /// photos that land in at least one album, once per photo, so the offset
    /// carried between photos follows the input order.
    #[instrument(skip(self, records), fields(photos = records.len(), albums = self.rules.len()))]
    pub fn match_photos(&self, records: &[MetadataRecord]) -> Result<AlbumMembership> {
        let mut membership: AlbumMembership = self
            .rules
            .iter()
            .map(|rule| (rule.album().to_string(), HashSet::new()))
            .collect();
        let mut resolver = TimeResolver::new(self.fallback_offset);

        for record in records {
            let short_path = self.short_path(Path::new(&record.source_file));
            let evaluated = keywords_for_matching(&record.keywords);

            let albums: Vec<&str> = self
                .rules
                .iter()
                .filter(|rule| rule.matches(&short_path, &evaluated))
                .map(CompiledRule::album)
                .collect();

            if albums.is_empty() {
                continue;
            }

            let creation_time = resolver.resolve(record)?;
            let photo = Photo::local(
                short_path,
                &record.source_file,
                creation_time,
                record.keywords.clone(),
            );
            debug!(photo = %photo, albums = ?albums, "Photo matched");

            for album in albums {
                if let Some(set) = membership.get_mut(album) {
                    set.insert(photo.clone());
                }
            }
        }

        for (album, photos) in &membership {
            info!(album = %album, photos = photos.len(), "Album matched");
        }

        Ok(membership)
    }
}

/// Keywords as seen by the patterns: a photo without keywords is evaluated as
/// carrying one empty keyword, so permissive patterns like `.*` still admit it.
fn keywords_for_matching(keywords: &[String]) -> Vec<String> {
    if keywords.is_empty() {
        vec![String::new()]
    } else {
        keywords.to_vec()
    }
}

/// Every photo of every album, once
pub fn all_photos(membership: &AlbumMembership) -> HashSet<Photo> {
    membership.values().flatten().cloned().collect()
}
