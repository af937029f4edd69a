/// Clinic API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string.
    pub database_url: String,
    /// Port the HTTP server binds to.
    pub port: u16,
    /// HS256 secret for signing admin tokens.
    pub jwt_secret: String,
    /// Admin login email.
    pub admin_email: String,
    /// Admin login password.
    pub admin_password: String,
    /// When true, simulated payment/video provider references are attached
    /// to responses instead of calling the real external services.
    pub demo_mode: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Panics with a descriptive message if a required variable is missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_var("DATABASE_URL"),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4010),
            jwt_secret: required_var("JWT_SECRET"),
            admin_email: required_var("ADMIN_EMAIL"),
            admin_password: required_var("ADMIN_PASSWORD"),
            demo_mode: std::env::var("DEMO_MODE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

fn required_var(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{name} env var is required"))
}
