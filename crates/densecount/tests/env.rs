//! Tests for `CountParams::from_env`.
//!
//! These modify the process environment, so they live in their own test binary and run as a
//! single test.

use std::env;

use densecount::{kde::BandwidthMethod, CountError, CountParams};

#[test]
fn bandwidth_from_env() {
    let var = CountParams::BANDWIDTH_ENV_VAR;

    env::remove_var(var);
    let params = CountParams::from_env(0.5).unwrap();
    assert_eq!(params, CountParams::new(0.5));

    env::set_var(var, "cv_ml");
    let params = CountParams::from_env(0.5).unwrap();
    assert_eq!(params.bandwidth(), &BandwidthMethod::CrossValidationMl);
    assert_eq!(params.threshold(), 0.5);

    env::set_var(var, " 2.5, 4 ");
    let params = CountParams::from_env(0.5).unwrap();
    assert_eq!(params.bandwidth(), &BandwidthMethod::Fixed([2.5, 4.0]));

    env::set_var(var, "silverman");
    assert_eq!(
        CountParams::from_env(0.5),
        Err(CountError::InvalidEnvVar {
            var,
            value: "silverman".into()
        })
    );

    env::set_var(var, "0,1");
    assert!(matches!(
        CountParams::from_env(0.5),
        Err(CountError::InvalidEnvVar { .. })
    ));

    env::remove_var(var);
}
