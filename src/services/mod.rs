pub mod session;
pub mod spotify;

pub use session::SessionSigner;
pub use spotify::{
    Album, Artist, Playlist, PlaylistTrack, RequestExecutor, SpotifyService, TimeRange, TokenGrant,
    Track, UpstreamRequest,
};
