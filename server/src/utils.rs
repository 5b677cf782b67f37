use std::time::{Duration, SystemTime, UNIX_EPOCH};

// Current wall-clock time as epoch seconds, saturated into the wire's u32
pub fn epoch_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
        .min(u32::MAX as u64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_secs_is_recent() {
        let now = epoch_secs();
        // Well after 2020, well before the u32 saturation point.
        assert!(now > 1_577_836_800);
        assert!(now < u32::MAX);
    }
}
