#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub app_url: String,
    pub jwt_secret: String,
    pub jwt_maxage: i64,
    pub port: u16,
    // Scheduling provider admin API (appointment sync + account credits)
    pub scheduling_api_base_url: String,
    pub scheduling_api_key: String,
    // SMS provider for referral invitations
    pub sms_api_base_url: String,
    pub sms_api_key: String,
    pub sms_from_number: String,
    // Shared secret for the scheduled reconciliation endpoint
    pub cron_secret: String,
}

impl Config {
    pub fn init() -> Config {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let jwt_secret = std::env::var("JWT_SECRET_KEY").expect("JWT_SECRET_KEY must be set");
        let jwt_maxage = std::env::var("JWT_MAXAGE").expect("JWT_MAXAGE must be set");
        let app_url = std::env::var("APP_URL").expect("APP_URL must be set");
        let cron_secret = std::env::var("CRON_SECRET").expect("CRON_SECRET must be set");

        // Scheduling provider configuration (with sandbox defaults)
        let scheduling_api_base_url = std::env::var("SCHEDULING_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.scheduling.example.com".to_string());
        let scheduling_api_key = std::env::var("SCHEDULING_API_KEY")
            .unwrap_or_else(|_| "test_api_key".to_string());

        // SMS provider configuration (with defaults)
        let sms_api_base_url = std::env::var("SMS_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.sms.example.com".to_string());
        let sms_api_key = std::env::var("SMS_API_KEY").unwrap_or_else(|_| "".to_string());
        let sms_from_number = std::env::var("SMS_FROM_NUMBER").unwrap_or_else(|_| "".to_string());

        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(8000);

        Config {
            database_url,
            app_url,
            jwt_secret,
            jwt_maxage: jwt_maxage.parse::<i64>().unwrap(),
            port,
            scheduling_api_base_url,
            scheduling_api_key,
            sms_api_base_url,
            sms_api_key,
            sms_from_number,
            cron_secret,
        }
    }
}
