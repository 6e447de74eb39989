use crate::tiles::id::TileId;
use std::path::{Path, PathBuf};

/// A tile the loader wants fetched from the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub id: TileId,
    /// Server-relative path, `/` separated
    pub remote_path: String,
    /// Where the downloaded file is expected to land
    pub local_path: PathBuf,
}

impl FetchRequest {
    pub fn new(id: TileId, remote_path: String, local_path: PathBuf) -> Self {
        Self {
            id,
            remote_path,
            local_path,
        }
    }

    /// Opaque token identifying the tile, for transports that only carry strings
    pub fn token(&self) -> String {
        self.id.to_string()
    }

    /// Completion message for this request, to be sent once the file is in place
    pub fn completed(&self) -> FetchCompletion {
        FetchCompletion {
            id: self.id,
            local_path: self.local_path.clone(),
        }
    }
}

/// Notification that a scheduled download finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchCompletion {
    pub id: TileId,
    pub local_path: PathBuf,
}

/// External transport that moves tile bytes from a server to disk.
///
/// Requests are fire-and-forget. Once the file is written the transport
/// reports back through the loader's completion channel
/// ([`crate::TileLoader::completion_sender`]) or through
/// [`crate::TileLoader::on_fetch_complete`] with the request's token.
pub trait DownloadScheduler: Send + Sync {
    fn schedule_fetch(&self, request: FetchRequest);
}

impl<F> DownloadScheduler for F
where
    F: Fn(FetchRequest) + Send + Sync,
{
    fn schedule_fetch(&self, request: FetchRequest) {
        self(request)
    }
}

/// Splits the token back out of a completion callback
pub(crate) fn parse_token(token: &str, local_path: &Path) -> crate::Result<FetchCompletion> {
    Ok(FetchCompletion {
        id: token.parse()?,
        local_path: local_path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_request_token_round_trips() {
        let request = FetchRequest::new(
            TileId::new(4, 9, 3),
            "earth/srtm/4/9/3.png".into(),
            PathBuf::from("/maps/earth/srtm/4/9/3.png"),
        );
        assert_eq!(request.token(), "4:9:3");

        let completion = parse_token(&request.token(), &request.local_path).unwrap();
        assert_eq!(completion, request.completed());
        assert!(parse_token("4:9", &request.local_path).is_err());
    }

    #[test]
    fn test_closures_schedule_fetches() {
        let seen = Mutex::new(Vec::new());
        let scheduler = |request: FetchRequest| seen.lock().unwrap().push(request.id);

        scheduler.schedule_fetch(FetchRequest::new(
            TileId::new(0, 1, 0),
            String::new(),
            PathBuf::new(),
        ));
        assert_eq!(*seen.lock().unwrap(), vec![TileId::new(0, 1, 0)]);
    }
}
