#[cfg(feature = "indicatif")]
use indicatif::{ProgressBar, ProgressStyle};

/// `num` evenly spaced values over `[start, stop]`, both ends included.
/// The last value is exactly `stop`, whatever the rounding of the step.
pub fn linspace(start: f64, stop: f64, num: usize) -> Vec<f64> {
    match num {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            let mut values: Vec<f64> = (0..num).map(|i| start + i as f64 * step).collect();
            values[num - 1] = stop;
            values
        }
    }
}

/// Default worker count: all cores but one, at least one
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .saturating_sub(1)
        .max(1)
}

#[cfg(feature = "indicatif")]
fn progress_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {percent} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Progress bar over `total` files, hidden for single-file runs
#[cfg(feature = "indicatif")]
pub fn file_progress(total: usize, message: &'static str) -> ProgressBar {
    if total <= 1 {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total as u64);
    pb.set_style(progress_style());
    pb.set_message(message);
    pb.tick();
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(0.0, 10.0, 3);
        assert_eq!(v, vec![0.0, 5.0, 10.0]);

        let v = linspace(0.1, 0.7, 7);
        assert_eq!(v.len(), 7);
        assert_eq!(v[0], 0.1);
        assert_eq!(v[6], 0.7);
        assert!(v.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_linspace_degenerate() {
        assert_eq!(linspace(4.0, 4.0, 4), vec![4.0; 4]);
        assert_eq!(linspace(1.0, 2.0, 1), vec![1.0]);
        assert!(linspace(1.0, 2.0, 0).is_empty());
    }

    #[test]
    fn test_default_workers() {
        assert!(default_workers() >= 1);
    }
}
