#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `hazard_shp` binary.
//!
//! [`init_logger`] routes `log` output through the same [`MultiProgress`]
//! that draws the conversion bars, and [`IndicatifProgress`] reports
//! area-source progress to the pipelines in `hazard_shp_convert`.

use std::sync::Arc;
use std::time::Duration;

use hazard_shp_convert::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Area-source progress drawn with `indicatif`.
pub struct IndicatifProgress {
    bar: ProgressBar,
    sized_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Counts area-source features as a pipeline reads or writes them.
    ///
    /// Shapefile reads do not know the feature count in advance, so the bar
    /// shows a running tally. Writes announce the number of sources in the
    /// model through [`ProgressCallback::set_total`], and from then on the
    /// bar shows `written/total`.
    #[must_use]
    pub fn features_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::counting(multi, message))
    }

    fn counting(multi: &MultiProgress, message: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}: {pos} area sources")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let sized_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.cyan/dim} {pos}/{len} area sources [{elapsed}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");

        Self { bar, sized_style }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.sized_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge`, so warnings about skipped sources or probability
/// sums print above the conversion bars instead of through them.
///
/// Every [`IndicatifProgress`] must be added to the returned
/// [`MultiProgress`].
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A second call keeps the first logger.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn read_progress_counts_without_a_total() {
        let progress = IndicatifProgress::counting(&hidden(), "Reading area sources");

        progress.inc(1);
        progress.inc(1);
        progress.finish("Read 2 area sources".to_string());

        assert_eq!(progress.bar.length(), None);
        assert_eq!(progress.bar.position(), 2);
        assert!(progress.bar.is_finished());
    }

    #[test]
    fn write_total_resets_the_count() {
        let progress = IndicatifProgress::counting(&hidden(), "Writing area sources");
        progress.inc(4);

        progress.set_total(3);
        progress.inc(1);

        assert_eq!(progress.bar.length(), Some(3));
        assert_eq!(progress.bar.position(), 1);
        assert!(!progress.bar.is_finished());
    }
}
