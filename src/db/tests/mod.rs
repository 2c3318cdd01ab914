use crate::db::*;
use tempfile::NamedTempFile;


/// Helper: create a fresh database with migrations applied
async fn setup_db() -> (Database, NamedTempFile) {
    let temp_file = NamedTempFile::new().unwrap();
    let db = Database::new(temp_file.path()).await.unwrap();
    (db, temp_file)
}

/// Helper: an episode with sensible defaults
fn sample_episode(hash: &str, published: i64, state: EpisodeState) -> Episode {
    Episode {
        title: format!("Show.S01E01.720p.{hash}"),
        published,
        link: format!("magnet:?xt=urn:btih:{hash}"),
        uid: 1,
        showid: 2,
        showname: "Show".to_string(),
        hash: hash.to_string(),
        quality: "720p".to_string(),
        season: 1,
        episode: 1,
        dir: "/tv/Show/Season01/".to_string(),
        state,
    }
}
