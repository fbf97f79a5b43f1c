use std::sync::Arc;

/// Decoded RGBA image handed to effects that draw a background image.
/// Decoding happens outside the core; this is the opaque asset form.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAsset {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl ImageAsset {
    /// Solid-colour placeholder, mostly useful in tests and demos.
    pub fn solid(width: usize, height: usize, colour: [u8; 4]) -> Self {
        let mut rgba = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            rgba.extend_from_slice(&colour);
        }
        Self {
            width,
            height,
            rgba,
        }
    }
}

/// Fire-and-forget artwork loading keyed by song id.
///
/// Loading is asynchronous relative to the render loop: `request` records
/// which song the engine wants artwork for, the surrounding application
/// performs the fetch and calls `complete`, and effects read `current`
/// best-effort each frame. A completion that arrives after the song changed
/// is dropped rather than overwriting the newer request (cancellation by
/// detachment).
#[derive(Debug, Default)]
pub struct ArtworkStore {
    pending: Option<PendingRequest>,
    current: Option<(String, Arc<ImageAsset>)>,
}

#[derive(Debug)]
struct PendingRequest {
    song_id: String,
    url: String,
}

impl ArtworkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks artwork for `song_id` as wanted. Supersedes any earlier request.
    pub fn request(&mut self, song_id: &str, url: &str) {
        tracing::debug!(song_id, url, "artwork requested");
        self.pending = Some(PendingRequest {
            song_id: song_id.to_string(),
            url: url.to_string(),
        });
    }

    /// URL of the outstanding request, if any, for the loader to fetch.
    pub fn pending_url(&self) -> Option<&str> {
        self.pending.as_ref().map(|request| request.url.as_str())
    }

    /// Delivers a loaded image. Returns `false` (and drops the image) when
    /// the request it answers has been superseded.
    pub fn complete(&mut self, song_id: &str, image: ImageAsset) -> bool {
        match &self.pending {
            Some(request) if request.song_id == song_id => {
                self.pending = None;
                self.current = Some((song_id.to_string(), Arc::new(image)));
                true
            }
            _ => {
                tracing::debug!(song_id, "dropping stale artwork completion");
                false
            }
        }
    }

    /// Reports a failed load. Non-fatal: the effect keeps drawing without a
    /// background image.
    pub fn fail(&mut self, song_id: &str, reason: &str) {
        if self
            .pending
            .as_ref()
            .map(|request| request.song_id == song_id)
            .unwrap_or(false)
        {
            tracing::warn!(song_id, reason, "artwork load failed");
            self.pending = None;
        }
    }

    /// Best-effort artwork for the given song; `None` while still loading.
    pub fn current_for(&self, song_id: &str) -> Option<Arc<ImageAsset>> {
        self.current
            .as_ref()
            .filter(|(id, _)| id == song_id)
            .map(|(_, image)| image.clone())
    }

    /// Forgets everything, e.g. when the session is torn down.
    pub fn clear(&mut self) {
        self.pending = None;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_for_the_requested_song_is_kept() {
        let mut store = ArtworkStore::new();
        store.request("song-1", "https://cdn.example/1.jpg");

        assert!(store.complete("song-1", ImageAsset::solid(2, 2, [1, 2, 3, 255])));
        assert!(store.current_for("song-1").is_some());
    }

    #[test]
    fn stale_completion_is_dropped_after_song_change() {
        let mut store = ArtworkStore::new();
        store.request("song-1", "https://cdn.example/1.jpg");
        store.request("song-2", "https://cdn.example/2.jpg");

        assert!(!store.complete("song-1", ImageAsset::solid(2, 2, [0; 4])));
        assert!(store.current_for("song-1").is_none());
        assert!(store.complete("song-2", ImageAsset::solid(2, 2, [0; 4])));
    }

    #[test]
    fn failed_load_clears_the_pending_request() {
        let mut store = ArtworkStore::new();
        store.request("song-1", "https://cdn.example/1.jpg");
        store.fail("song-1", "404");

        assert!(store.pending_url().is_none());
        assert!(!store.complete("song-1", ImageAsset::solid(1, 1, [0; 4])));
    }
}
