use rand::Rng;

/// Development builds hand out a fixed code so signup can be exercised without an SMS gateway.
pub const DEVELOPMENT_OTP: &str = "1234";

pub fn generate_otp() -> String {
    let mut rng = rand::rng();
    format!("{:04}", rng.random_range(1000..10000))
}
