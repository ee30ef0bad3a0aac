use http::{HeaderName, HeaderValue, StatusCode};
use std::{collections::HashMap, fmt::Formatter, io::Cursor};
use tokio::io::AsyncRead;

/// Response of a request dispatched to the [`crate::actor::PlaylistActor`].
///
/// Mirrors an HTTP response closely enough that an embedder's HTTP layer can
/// copy `status`/`headers` onto its own response type and stream `body`
/// straight through, without this crate depending on any particular web
/// framework.
pub struct FileResponse {
    pub status: StatusCode,
    pub headers: Option<HashMap<HeaderName, HeaderValue>>,
    pub body: Option<Box<dyn AsyncRead + Send + Unpin>>,
}

impl std::fmt::Debug for FileResponse {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.status, self.headers)
    }
}

impl FileResponse {
    #[cfg(test)]
    #[allow(clippy::unwrap_used)]
    pub async fn print(mut self) -> String {
        use tokio::io::AsyncReadExt;
        let body = if let Some(body) = &mut self.body {
            let mut buf = "\n".to_owned();
            body.read_to_string(&mut buf).await.unwrap();
            buf
        } else {
            String::new()
        };
        format!("{}\n{:?}{}", self.status, self.headers, body)
    }
}

fn headers(content_type: &'static str) -> HashMap<HeaderName, HeaderValue> {
    #[allow(clippy::unwrap_used)]
    HashMap::from([(
        HeaderName::from_bytes(b"Content-Type").unwrap(),
        HeaderValue::from_str(content_type).unwrap(),
    )])
}

pub const CONTENT_TYPE_PLAYLIST: &str = "audio/mpegURL";
pub const CONTENT_TYPE_MP4: &str = "video/mp4";

pub fn ok_playlist(body: Vec<u8>) -> FileResponse {
    FileResponse {
        status: StatusCode::OK,
        headers: Some(headers(CONTENT_TYPE_PLAYLIST)),
        body: Some(Box::new(Cursor::new(body))),
    }
}

pub fn ok_media(reader: Box<dyn AsyncRead + Send + Unpin>) -> FileResponse {
    FileResponse {
        status: StatusCode::OK,
        headers: Some(headers(CONTENT_TYPE_MP4)),
        body: Some(reader),
    }
}

pub const NOT_FOUND: FileResponse = FileResponse {
    status: StatusCode::NOT_FOUND,
    headers: None,
    body: None,
};

pub const BAD_REQUEST: FileResponse = FileResponse {
    status: StatusCode::BAD_REQUEST,
    headers: None,
    body: None,
};

pub const CANCELLED: FileResponse = FileResponse {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    headers: None,
    body: None,
};

pub const INTERNAL_ERROR: FileResponse = FileResponse {
    status: StatusCode::INTERNAL_SERVER_ERROR,
    headers: None,
    body: None,
};
