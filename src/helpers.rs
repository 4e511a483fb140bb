use crate::consts::*;

/// Well-known deployments plus a local stack for development.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BaseUrl {
    Localhost,
    Testnet,
    Mainnet,
}

impl BaseUrl {
    pub fn get_url(&self) -> String {
        match self {
            BaseUrl::Localhost => LOCAL_API_URL.to_string(),
            BaseUrl::Testnet => TESTNET_API_URL.to_string(),
            BaseUrl::Mainnet => MAINNET_API_URL.to_string(),
        }
    }

    pub fn get_ws_url(&self) -> String {
        match self {
            BaseUrl::Localhost => LOCAL_WS_URL.to_string(),
            BaseUrl::Testnet => TESTNET_WS_URL.to_string(),
            BaseUrl::Mainnet => MAINNET_WS_URL.to_string(),
        }
    }
}

/// Seconds since the unix epoch, fractional.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Number of decimal places implied by a price step. Common tick sizes map
/// exactly; anything irregular keeps full precision.
pub fn decimals_for_step(step: f64) -> u32 {
    for d in 0..=8u32 {
        let unit = 10f64.powi(-(d as i32));
        if (step - unit).abs() < crate::EPSILON {
            return d;
        }
    }
    8
}

/// Round a price to the nearest multiple of the contract's price step, then
/// snap to the step's decimal precision so the wire string stays clean.
pub fn round_to_step(price: f64, step: f64) -> f64 {
    if step <= 0.0 {
        return price;
    }
    let raw = (price / step).round() * step;
    let factor = 10f64.powi(decimals_for_step(step) as i32);
    (raw * factor).round() / factor
}

/// Wire representation of a price already rounded to the step.
pub fn format_price(price: f64, step: f64) -> String {
    format!("{:.*}", decimals_for_step(step) as usize, price)
}

/// Wire representation of an order size.
pub fn format_size(size: f64) -> String {
    let s = format!("{:.6}", size);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_step_snaps_to_tick() {
        assert_eq!(round_to_step(100.26, 0.1), 100.3);
        assert_eq!(round_to_step(100.24, 0.1), 100.2);
        assert_eq!(round_to_step(0.12345, 0.01), 0.12);
        assert_eq!(round_to_step(42.0, 1.0), 42.0);
    }

    #[test]
    fn round_to_step_keeps_precision_clean() {
        // 0.1 steps must not pick up float dust
        let p = round_to_step(65_432.15, 0.1);
        assert_eq!(format_price(p, 0.1), "65432.2");
    }

    #[test]
    fn round_to_step_ignores_degenerate_step() {
        assert_eq!(round_to_step(1.2345, 0.0), 1.2345);
    }

    #[test]
    fn format_size_trims_trailing_zeros() {
        assert_eq!(format_size(0.01), "0.01");
        assert_eq!(format_size(0.030000), "0.03");
        assert_eq!(format_size(2.0), "2");
    }

    #[test]
    fn step_decimals() {
        assert_eq!(decimals_for_step(0.1), 1);
        assert_eq!(decimals_for_step(0.01), 2);
        assert_eq!(decimals_for_step(1.0), 0);
        assert_eq!(decimals_for_step(0.25), 8);
    }
}
