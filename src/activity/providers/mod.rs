pub mod github;
pub mod lastfm;
pub mod letterboxd;
