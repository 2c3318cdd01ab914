use super::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SHOWRSS_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:tv="https://showrss.info">
    <channel>
        <title>showRSS: feed</title>
        <link>http://showrss.info</link>
        <description>test feed</description>
        <item>
            <title>Show Name S02E05 720p</title>
            <link>magnet:?xt=urn:btih:ABC123&amp;dn=Show</link>
            <pubDate>Tue, 14 Nov 2023 22:13:20 +0000</pubDate>
            <tv:show_id>77</tv:show_id>
            <tv:episode_id>1234</tv:episode_id>
            <tv:show_name>Show: Name</tv:show_name>
            <tv:info_hash>ABC123</tv:info_hash>
        </item>
        <item>
            <title>Other.Show.1x03.HDTV</title>
            <link>magnet:?xt=urn:btih:DEF456&amp;dn=Other</link>
        </item>
        <item>
            <title>Broken entry</title>
            <link>http://example.com/not-a-magnet</link>
        </item>
    </channel>
</rss>"#;

const ATOM_FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
    <title>Atom shows</title>
    <id>urn:feed</id>
    <updated>2023-11-14T22:13:20Z</updated>
    <entry>
        <title>Atom Show S01E02 1080p</title>
        <id>urn:entry:1</id>
        <updated>2023-11-14T22:13:20Z</updated>
        <link href="http://example.com/page"/>
        <link href="magnet:?xt=urn:btih:ATOM1"/>
    </entry>
</feed>"#;

#[test]
fn parses_showrss_namespace() {
    let entries = parse_feed(SHOWRSS_FEED).unwrap();
    assert_eq!(entries.len(), 3);

    let first = &entries[0];
    assert_eq!(first.title.as_deref(), Some("Show Name S02E05 720p"));
    assert_eq!(first.show_name.as_deref(), Some("Show: Name"));
    assert_eq!(first.hash.as_deref(), Some("ABC123"));
    assert_eq!(first.uid, Some(1234));
    assert_eq!(first.showid, Some(77));
    assert_eq!(first.published, Some(1_700_000_000));

    let second = &entries[1];
    assert!(second.hash.is_none());
    assert!(second.published.is_none());
}

#[test]
fn falls_back_to_atom() {
    let entries = parse_feed(ATOM_FEED).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].link.as_deref(), Some("magnet:?xt=urn:btih:ATOM1"));
    assert_eq!(entries[0].published, Some(1_700_000_000));
}

#[test]
fn garbage_is_a_feed_error() {
    assert!(matches!(parse_feed("not xml at all"), Err(Error::Feed(_))));
}

#[tokio::test]
async fn ingest_builds_episodes_and_drops_unusable_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed.rss"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SHOWRSS_FEED))
        .mount(&server)
        .await;

    let ingester = FeedIngester::new().unwrap();
    let episodes = ingester
        .ingest(
            &format!("{}/feed.rss", server.uri()),
            "/media/{seriesname}/Season{seasonno:02}/",
        )
        .await;

    assert_eq!(episodes.len(), 2);
    assert_eq!(episodes[0].hash, "ABC123");
    assert_eq!(episodes[0].dir, "/media/Show Name/Season02/");
    assert_eq!(episodes[1].hash, "DEF456");
    assert_eq!(episodes[1].showname, "Other Show");
    assert_eq!((episodes[1].season, episodes[1].episode), (1, 3));
}

#[tokio::test]
async fn http_error_yields_no_episodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/down.rss"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let ingester = FeedIngester::new().unwrap();
    let uri = format!("{}/down.rss", server.uri());

    assert!(matches!(
        ingester.fetch_entries(&uri).await,
        Err(Error::Feed(_))
    ));
    assert!(ingester.ingest(&uri, "/tv").await.is_empty());
}

#[tokio::test]
async fn reads_file_locators() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("feed.xml");
    std::fs::write(&file, SHOWRSS_FEED).unwrap();
    let uri = url::Url::from_file_path(&file).unwrap().to_string();

    let ingester = FeedIngester::new().unwrap();
    let episodes = ingester.ingest(&uri, "/tv/{seriesname}").await;
    assert_eq!(episodes.len(), 2);

    let missing = url::Url::from_file_path(dir.path().join("nope.xml"))
        .unwrap()
        .to_string();
    assert!(ingester.ingest(&missing, "/tv").await.is_empty());
}
