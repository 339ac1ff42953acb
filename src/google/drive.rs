use serde::{Deserialize, Serialize};

use crate::config::ApiSettings;
use crate::error::ReportError;
use crate::google::{Api, GoogleHttp, Replay};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveFile {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveFile>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub role: String,
    #[serde(rename = "type")]
    pub grantee_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
}

#[derive(Serialize)]
struct CopyBody<'a> {
    name: &'a str,
    parents: [&'a str; 1],
}

pub trait DriveClient: Send + Sync {
    fn list_files(&self, query: &str, page_token: Option<&str>) -> Result<FileList, ReportError>;
    fn copy_file(&self, file_id: &str, name: &str, folder_id: &str)
        -> Result<DriveFile, ReportError>;
    fn delete_file(&self, file_id: &str) -> Result<(), ReportError>;
    fn create_permission(&self, file_id: &str, permission: &Permission) -> Result<(), ReportError>;
}

pub struct DriveHttpClient {
    http: GoogleHttp,
}

impl DriveHttpClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, ReportError> {
        Ok(Self {
            http: GoogleHttp::new(Api::Drive, &settings.drive_base_url, settings)?,
        })
    }
}

impl DriveClient for DriveHttpClient {
    fn list_files(&self, query: &str, page_token: Option<&str>) -> Result<FileList, ReportError> {
        let url = self.http.url("files");
        tracing::debug!(query, ?page_token, "files.list");
        let response = self.http.send(Replay::Idempotent, || {
            let mut request = self.http.client().get(&url).query(&[
                ("q", query),
                ("fields", "nextPageToken,files(id,name)"),
                ("supportsAllDrives", "true"),
                ("includeItemsFromAllDrives", "true"),
            ]);
            if let Some(token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }
            request
        })?;
        self.http.json(response)
    }

    fn copy_file(
        &self,
        file_id: &str,
        name: &str,
        folder_id: &str,
    ) -> Result<DriveFile, ReportError> {
        let url = self.http.url(&format!("files/{file_id}/copy"));
        let body = CopyBody {
            name,
            parents: [folder_id],
        };
        tracing::debug!(file_id, name, "files.copy");
        let response = self.http.send(Replay::Rejected, || {
            self.http
                .client()
                .post(&url)
                .query(&[("supportsAllDrives", "true"), ("fields", "id,name")])
                .json(&body)
        })?;
        self.http.json(response)
    }

    fn delete_file(&self, file_id: &str) -> Result<(), ReportError> {
        let url = self.http.url(&format!("files/{file_id}"));
        tracing::debug!(file_id, "files.delete");
        self.http.send(Replay::Idempotent, || {
            self.http
                .client()
                .delete(&url)
                .query(&[("supportsAllDrives", "true")])
        })?;
        Ok(())
    }

    fn create_permission(&self, file_id: &str, permission: &Permission) -> Result<(), ReportError> {
        let url = self.http.url(&format!("files/{file_id}/permissions"));
        tracing::debug!(file_id, role = %permission.role, "permissions.create");
        self.http.send(Replay::Rejected, || {
            self.http
                .client()
                .post(&url)
                .query(&[("supportsAllDrives", "true"), ("sendNotificationEmail", "false")])
                .json(permission)
        })?;
        Ok(())
    }
}

/// Drive query matching live files named `name` directly inside `folder_id`.
pub fn name_in_folder_query(name: &str, folder_id: &str) -> String {
    format!(
        "name = '{}' and '{}' in parents and trashed = false",
        escape_query(name),
        escape_query(folder_id)
    )
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Id of the one report named `name` in `folder_id`, following page tokens
/// until the listing is exhausted.
pub fn get_report_file_id(
    drive: &dyn DriveClient,
    folder_id: &str,
    name: &str,
) -> Result<String, ReportError> {
    let query = name_in_folder_query(name, folder_id);
    let mut found = Vec::new();
    let mut page_token: Option<String> = None;
    loop {
        let page = drive.list_files(&query, page_token.as_deref())?;
        found.extend(page.files.into_iter().filter(|file| file.name == name));
        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }
    match found.len() {
        0 => Err(ReportError::ReportNotFound(name.to_string())),
        1 => Ok(found.remove(0).id),
        count => Err(ReportError::AmbiguousReport {
            name: name.to_string(),
            count,
        }),
    }
}
