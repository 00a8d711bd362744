//! Tests for DriveClient with mocked HTTP responses.

use futures::StreamExt;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

use drive_zip::models::{FileListResponse, RemoteObject, ServiceAccountCredentials};
use drive_zip::{ArchiveSink, Authenticator, DriveClient, DriveError, RemoteGateway, Traversal};

const TOKEN: &str = "test-token";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

fn client_for(server: &ServerGuard) -> DriveClient {
    DriveClient::new(Authenticator::from_access_token(TOKEN)).with_base_url(server.url())
}

fn object(id: &str, name: &str, mime_type: &str) -> RemoteObject {
    RemoteObject {
        id: id.to_string(),
        name: name.to_string(),
        mime_type: mime_type.to_string(),
        size: None,
    }
}

async fn read_all(client: &DriveClient, object: &RemoteObject) -> (Vec<u8>, Option<&'static str>) {
    let mut content = client.open_content_stream(object).await.unwrap();
    let mut body = Vec::new();
    while let Some(chunk) = content.stream.next().await {
        body.extend_from_slice(&chunk.unwrap());
    }
    (body, content.extension)
}

mod metadata {
    use super::*;

    #[tokio::test]
    async fn fetch_object() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/files/file123")
            .match_header("authorization", format!("Bearer {TOKEN}").as_str())
            .match_query(Matcher::UrlEncoded("supportsAllDrives".into(), "true".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "id": "file123",
                    "name": "document.pdf",
                    "mimeType": "application/pdf",
                    "size": "2048"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let object = client.fetch_object("file123").await.unwrap();

        assert_eq!(object.name, "document.pdf");
        assert_eq!(object.size, Some(2048));
        assert!(!client.is_folder(&object));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn status_codes_are_classified() {
        let mut server = Server::new_async().await;
        let mut mocks = Vec::new();
        for (id, status) in [("missing", 404), ("denied", 401), ("busy", 503)] {
            let mock = server
                .mock("GET", format!("/files/{id}").as_str())
                .match_query(Matcher::Any)
                .with_status(status)
                .with_body(
                    json!({"error": {"code": status, "message": format!("status {status}")}})
                        .to_string(),
                )
                .create_async()
                .await;
            mocks.push(mock);
        }

        let client = client_for(&server);
        assert!(matches!(
            client.fetch_object("missing").await,
            Err(DriveError::NotFound(_))
        ));
        assert!(matches!(
            client.fetch_object("denied").await,
            Err(DriveError::AuthError(_))
        ));
        assert!(matches!(
            client.fetch_object("busy").await,
            Err(DriveError::TransientNetworkError(_))
        ));
    }
}

mod timeouts {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn stalled_response_is_transient() {
        // Accepts connections and never answers.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let silent = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let client = DriveClient::new(Authenticator::from_access_token(TOKEN))
            .with_base_url(format!("http://{addr}"))
            .with_read_timeout(Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(10), client.fetch_object("file123"))
            .await
            .expect("read timeout did not fire");

        assert!(matches!(result, Err(DriveError::TransientNetworkError(_))));
        silent.abort();
    }
}

mod listing {
    use super::*;

    #[tokio::test]
    async fn follows_every_page() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), "'folder1' in parents and trashed = false".into()),
                Matcher::Regex("fields=[^&]*$".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "files": [
                        {"id": "f1", "name": "one.txt", "mimeType": "text/plain"},
                        {"id": "sub", "name": "Sub", "mimeType": "application/vnd.google-apps.folder"}
                    ],
                    "nextPageToken": "p2"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let second = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_body(
                json!({"files": [{"id": "f2", "name": "two.txt", "mimeType": "text/plain"}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let children = client.list_children("folder1").await.unwrap();

        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["one.txt", "Sub", "two.txt"]);
        assert!(children[1].is_folder());
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn empty_folder_is_not_an_error() {
        let mut server = Server::new_async().await;
        let _mock1 = server
            .mock("GET", "/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"files": []}).to_string())
            .create_async()
            .await;

        let client = client_for(&server);
        assert!(client.list_children("empty").await.unwrap().is_empty());
    }
}

mod content {
    use super::*;

    #[tokio::test]
    async fn stored_file_uses_media_download() {
        let mut server = Server::new_async().await;
        let _mock2 = server
            .mock("GET", "/files/bin1")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(200)
            .with_body("raw bytes")
            .create_async()
            .await;

        let client = client_for(&server);
        let (body, extension) = read_all(&client, &object("bin1", "a.bin", "application/octet-stream")).await;
        assert_eq!(body, b"raw bytes");
        assert_eq!(extension, None);
    }

    #[tokio::test]
    async fn native_document_is_exported() {
        let mut server = Server::new_async().await;
        let _mock3 = server
            .mock("GET", "/files/doc1/export")
            .match_query(Matcher::UrlEncoded("mimeType".into(), DOCX.into()))
            .with_status(200)
            .with_body("docx bytes")
            .create_async()
            .await;

        let client = client_for(&server);
        let doc = object("doc1", "Plan", "application/vnd.google-apps.document");
        let (body, extension) = read_all(&client, &doc).await;
        assert_eq!(body, b"docx bytes");
        assert_eq!(extension, Some(".docx"));
    }

    #[tokio::test]
    async fn open_failure_is_download_error() {
        let mut server = Server::new_async().await;
        let _mock4 = server
            .mock("GET", "/files/gone")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client
            .open_content_stream(&object("gone", "gone.txt", "text/plain"))
            .await;
        assert!(matches!(result, Err(DriveError::DownloadError { ref id, .. }) if id == "gone"));
    }
}

mod end_to_end {
    use super::*;
    use std::io::Read;

    #[tokio::test]
    async fn folder_into_archive() {
        let mut server = Server::new_async().await;
        let _mock5 = server
            .mock("GET", "/files/root")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({"id": "root", "name": "Root", "mimeType": "application/vnd.google-apps.folder"})
                    .to_string(),
            )
            .create_async()
            .await;
        let _mock6 = server
            .mock("GET", "/files")
            .match_query(Matcher::UrlEncoded(
                "q".into(),
                "'root' in parents and trashed = false".into(),
            ))
            .with_status(200)
            .with_body(
                json!({"files": [
                    {"id": "f1", "name": "notes.txt", "mimeType": "text/plain", "size": "5"},
                    {"id": "d1", "name": "Plan", "mimeType": "application/vnd.google-apps.document"}
                ]})
                .to_string(),
            )
            .create_async()
            .await;
        let _mock7 = server
            .mock("GET", "/files/f1")
            .match_query(Matcher::UrlEncoded("alt".into(), "media".into()))
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;
        let _mock8 = server
            .mock("GET", "/files/d1/export")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("docx")
            .create_async()
            .await;

        let client = client_for(&server);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("google-drive.zip");
        let sink = ArchiveSink::create(&out).await.unwrap();

        let tree = Traversal::new(&client, &sink, 2).run("root").await.unwrap();
        assert_eq!(tree.paths(), vec!["notes.txt", "Plan.docx"]);
        assert!(sink.finalize().await.unwrap() > 0);

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&out).unwrap()).unwrap();
        let mut body = String::new();
        archive
            .by_name("notes.txt")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "hello");
        assert!(archive.by_name("Plan.docx").is_ok());
    }
}

mod models {
    use super::*;

    #[test]
    fn folder_without_size() {
        let object: RemoteObject = serde_json::from_value(json!({
            "id": "folder123",
            "name": "My Folder",
            "mimeType": "application/vnd.google-apps.folder"
        }))
        .unwrap();

        assert!(object.is_folder());
        assert_eq!(object.size, None);
    }

    #[test]
    fn list_response_with_token() {
        let response: FileListResponse = serde_json::from_value(json!({
            "files": [{"id": "f1", "name": "file1.txt"}],
            "nextPageToken": "token123"
        }))
        .unwrap();

        assert_eq!(response.files.len(), 1);
        assert_eq!(response.files[0].mime_type, "");
        assert_eq!(response.next_page_token, Some("token123".to_string()));
    }
}

mod credentials {
    use super::*;
    use drive_zip::auth::DEFAULT_SCOPE;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn credentials_from_json() {
        let creds: ServiceAccountCredentials = serde_json::from_value(json!({
            "client_email": "test@project.iam.gserviceaccount.com",
            "private_key": "key",
            "token_uri": "https://oauth2.googleapis.com/token"
        }))
        .unwrap();

        assert_eq!(creds.client_email, "test@project.iam.gserviceaccount.com");
        assert_eq!(creds.token_uri.as_deref(), Some("https://oauth2.googleapis.com/token"));
    }

    #[test]
    fn authenticator_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let creds_json = json!({
            "client_email": "test@project.iam.gserviceaccount.com",
            "private_key": "key"
        });
        temp_file.write_all(creds_json.to_string().as_bytes()).unwrap();

        let scopes = vec![DEFAULT_SCOPE.to_string()];
        assert!(Authenticator::from_file(temp_file.path(), scopes).is_ok());
    }

    #[test]
    fn authenticator_rejects_bad_input() {
        let scopes = vec![DEFAULT_SCOPE.to_string()];
        assert!(matches!(
            Authenticator::from_file("/nonexistent/path/credentials.json", scopes.clone()),
            Err(DriveError::CredentialsFileError(_))
        ));
        assert!(matches!(
            Authenticator::from_json("not valid json", scopes.clone()),
            Err(DriveError::CredentialsParseError(_))
        ));
        assert!(matches!(
            Authenticator::from_json("{}", scopes),
            Err(DriveError::CredentialsParseError(_))
        ));
    }
}
