use std::collections::HashMap;

/// Get a parameter value with a default fallback
pub fn get_param(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params.get(key).copied().unwrap_or(default)
}

/// Get a parameter as usize with a minimum value
pub fn get_usize_param_min(
    params: &HashMap<String, f64>,
    key: &str,
    default: usize,
    min: usize,
) -> usize {
    params
        .get(key)
        .copied()
        .filter(|v| v.is_finite())
        .map(|v| v.round().max(min as f64) as usize)
        .unwrap_or(default)
}

/// Extract a parameter as f64, clamped to a range with finite checks
pub fn get_param_clamped(
    params: &HashMap<String, f64>,
    key: &str,
    default: f64,
    min: f64,
    max: f64,
) -> f64 {
    let raw = params.get(key).copied().unwrap_or(default);
    if !raw.is_finite() {
        return default;
    }
    raw.clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_param_falls_back_to_default() {
        let mut params = HashMap::new();
        params.insert("short_period".to_string(), 9.0);
        assert_eq!(get_param(&params, "short_period", 7.0), 9.0);
        assert_eq!(get_param(&params, "long_period", 25.0), 25.0);
    }

    #[test]
    fn get_usize_param_min_enforces_floor_and_rejects_nan() {
        let mut params = HashMap::new();
        params.insert("period".to_string(), 0.4);
        assert_eq!(get_usize_param_min(&params, "period", 14, 1), 1);
        params.insert("period".to_string(), f64::NAN);
        assert_eq!(get_usize_param_min(&params, "period", 14, 1), 14);
    }

    #[test]
    fn get_param_clamped_bounds_values() {
        let mut params = HashMap::new();
        params.insert("rsi_oversold".to_string(), -10.0);
        assert_eq!(get_param_clamped(&params, "rsi_oversold", 30.0, 0.0, 100.0), 0.0);
        params.insert("rsi_oversold".to_string(), f64::INFINITY);
        assert_eq!(get_param_clamped(&params, "rsi_oversold", 30.0, 0.0, 100.0), 30.0);
    }
}
