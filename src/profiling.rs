use std::time::Instant;

/// Times a scope and logs the elapsed time when dropped
pub struct ProfileScope {
    label: String,
    start: Instant,
}

impl ProfileScope {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for ProfileScope {
    fn drop(&mut self) {
        log::debug!(
            "[PROFILE] {} - {:.3}ms",
            self.label,
            self.start.elapsed().as_secs_f64() * 1000.0
        );
    }
}

/// Macro for easy profiling
#[macro_export]
macro_rules! profile_scope {
    ($label:expr) => {
        let _profile_scope = $crate::profiling::ProfileScope::new($label);
    };
}
