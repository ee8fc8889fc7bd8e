use crate::config::{DriveConfig, GoogleConfig};
use crate::error::Error;
use chrono::{Datelike, NaiveDate};
use log::info;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct DriveFile {
    id: String,
}

/// A freshly copied waterfall spreadsheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Duplicate {
    pub name: String,
    pub link: String,
}

pub struct DriveClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl DriveClient {
    pub fn new(client: Client, config: &GoogleConfig) -> Self {
        DriveClient {
            client,
            base_url: config.drive_api_url.clone(),
            access_token: config.google_access_token.clone(),
        }
    }

    fn files_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| Error::UrlParsingFailed(url::ParseError::SetHostOnCannotBeABaseUrl))?
            .pop_if_empty()
            .extend(&["drive", "v3", "files"])
            .extend(segments);
        Ok(url)
    }

    async fn copy_file(&self, file_id: &str, name: &str) -> Result<String, Error> {
        let resp = self
            .client
            .post(self.files_url(&[file_id, "copy"])?)
            .bearer_auth(&self.access_token)
            .json(&json!({ "name": name }))
            .send()
            .await?;

        let file: DriveFile = check_status(resp).await?.json().await?;
        Ok(file.id)
    }

    async fn share(&self, file_id: &str, email: &str) -> Result<(), Error> {
        let mut url = self.files_url(&[file_id, "permissions"])?;
        url.query_pairs_mut()
            .append_pair("fields", "id")
            .append_pair("sendNotificationEmail", "false");

        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({
                "type": "user",
                "role": "writer",
                "emailAddress": email,
            }))
            .send()
            .await?;
        check_status(resp).await?;

        Ok(())
    }

    /// Copies the blank waterfall template under today's name and shares it as writer
    /// with every configured address.
    pub async fn duplicate_template(
        &self,
        config: &DriveConfig,
        today: NaiveDate,
    ) -> Result<Duplicate, Error> {
        let name = copy_name(today);
        let file_id = self.copy_file(&config.template_sheet_id, &name).await?;

        for email in config
            .share_emails
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
        {
            self.share(&file_id, email).await?;
        }

        info!("Copied and renamed sheet to '{}' with new file ID: {}", name, file_id);

        Ok(Duplicate {
            name,
            link: format!("https://docs.google.com/spreadsheets/d/{}/edit", file_id),
        })
    }
}

async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Drive { status, body })
}

/// `"9/12 - Waterfalls"` for September 12th.
pub fn copy_name(today: NaiveDate) -> String {
    format!("{}/{} - Waterfalls", today.month(), today.day())
}

/// Text posted after a duplication attempt.
pub fn duplicate_message(result: &Result<Duplicate, Error>, today: NaiveDate) -> String {
    match result {
        Ok(copy) => format!("<{}|{}>", copy.link, copy.name),
        Err(err) => format!("{}: \nError: {}", copy_name(today), err),
    }
}
