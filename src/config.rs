use clap::Args as ClapArgs;

const DEFAULT_API_URL: &str = "https://platform.ironsrc.com";
const DEFAULT_AUTH_URL: &str = "https://platform.ironsrc.com/partners/publisher/auth";
const DEFAULT_TOKEN_TTL_SECS: u64 = 3000;
const DEFAULT_SHEETS_API_URL: &str = "https://sheets.googleapis.com";
const DEFAULT_DRIVE_API_URL: &str = "https://www.googleapis.com";
const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";
const SUMMARY_FILE_PATH: &str = "Summary/summary.txt";

#[derive(ClapArgs)]
pub struct Config {
    #[arg(long, default_value = SUMMARY_FILE_PATH, env = "SUMMARY_FILE_PATH")]
    pub(crate) summary_file_path: String,
}

/// Mediation reporting API credentials and app keys.
#[derive(ClapArgs, Clone)]
pub struct SourceConfig {
    #[arg(long, default_value = DEFAULT_API_URL, env = "API_URL")]
    pub(crate) api_url: String,

    #[arg(long, default_value = DEFAULT_AUTH_URL, env = "AUTH_URL")]
    pub(crate) auth_url: String,

    #[arg(long, env = "IRONSOURCE_SECRET_KEY", hide_env_values = true)]
    pub(crate) secret_key: String,

    #[arg(long, env = "IRONSOURCE_REFRESH_TOKEN", hide_env_values = true)]
    pub(crate) refresh_token: String,

    #[arg(long, env = "IRONSOURCE_APP_KEY_IOS")]
    pub(crate) app_key_ios: String,

    #[arg(long, env = "IRONSOURCE_APP_KEY_ANDROID")]
    pub(crate) app_key_android: String,

    /// Seconds a bearer token is reused before a new exchange. 0 exchanges on every call.
    #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_SECS, env = "TOKEN_TTL_SECS")]
    pub(crate) token_ttl_secs: u64,
}

#[derive(ClapArgs, Clone)]
pub struct GoogleConfig {
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub(crate) google_access_token: String,

    #[arg(long, default_value = DEFAULT_SHEETS_API_URL, env = "SHEETS_API_URL")]
    pub(crate) sheets_api_url: String,

    #[arg(long, default_value = DEFAULT_DRIVE_API_URL, env = "DRIVE_API_URL")]
    pub(crate) drive_api_url: String,
}

#[derive(ClapArgs, Clone)]
pub struct SlackConfig {
    #[arg(long, default_value = DEFAULT_SLACK_API_URL, env = "SLACK_API_URL")]
    pub(crate) slack_api_url: String,

    #[arg(long, env = "SLACK_API_TOKEN", hide_env_values = true)]
    pub(crate) slack_token: String,

    #[arg(long, env = "SLACK_CHANNEL_ID")]
    pub(crate) slack_channel: String,
}

#[derive(ClapArgs, Clone)]
pub struct DriveConfig {
    #[arg(long, env = "GOOGLE_SHEET_BLANK_WATERFALL_ID")]
    pub(crate) template_sheet_id: String,

    #[arg(long, env = "SHARE_EMAILS", value_delimiter = ',')]
    pub(crate) share_emails: Vec<String>,
}
