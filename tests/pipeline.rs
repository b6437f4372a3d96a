use serde_json::Value;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::ZipArchive;

use wp_to_orchard::config::{Config, Theme};
use wp_to_orchard::pipeline::{run_migration, MigrationContext, STAGING_DIR};

const FIXTURE: &str = include_str!("fixtures/export.xml");
const PHOTO: &str = "wp-content/uploads/2020/03/harbour-at-dawn.jpg";
const MISSING: &str = "wp-content/uploads/2020/03/lost-map.png";

/// Writes the fixture export into a temp dir with attachment URLs pointing
/// at `asset_host`.
fn setup_export(asset_host: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let export = tmp.path().join("export.xml");
    fs::write(&export, FIXTURE.replace("http://assets.invalid", asset_host)).unwrap();
    (tmp, export)
}

async fn asset_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", PHOTO)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{}", MISSING)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    server
}

fn test_config(theme: Theme, redirects: bool) -> Config {
    let mut config = Config::default();
    config.recipe.theme = theme;
    config.recipe.create_redirects = redirects;
    config.assets.timeout_secs = 5;
    config.assets.connect_timeout_secs = 2;
    config
}

fn read_recipe(archive: &Path) -> Value {
    let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut recipe = String::new();
    zip.by_name("recipe.json")
        .unwrap()
        .read_to_string(&mut recipe)
        .unwrap();
    serde_json::from_str(&recipe).unwrap()
}

fn archive_files(archive: &Path) -> Vec<String> {
    let mut zip = ZipArchive::new(File::open(archive).unwrap()).unwrap();
    let mut names = Vec::new();
    for i in 0..zip.len() {
        let entry = zip.by_index(i).unwrap();
        if !entry.is_dir() {
            names.push(entry.name().to_string());
        }
    }
    names.sort();
    names
}

fn content_item<'a>(content: &'a Value, id: &str) -> &'a Value {
    content["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|item| item["ContentItemId"] == id)
        .unwrap_or_else(|| panic!("missing content item {}", id))
}

#[tokio::test]
async fn migrates_export_into_the_blog_bundle() {
    let server = asset_server().await;
    let (tmp, export) = setup_export(&server.uri());
    let archive = tmp.path().join("out").join("site.zip");

    let report = run_migration(
        &test_config(Theme::TheBlog, false),
        &export,
        tmp.path(),
        &archive,
    )
    .await
    .unwrap();

    assert_eq!(report.site_title.as_deref(), Some("Harbour Notes"));
    assert_eq!(report.posts, 2);
    assert_eq!(report.pages, 1);
    assert_eq!(report.categories, 2);
    assert_eq!(report.tags, 1);
    assert_eq!(report.redirects, 0);
    assert_eq!(report.assets, 2);
    assert_eq!(report.downloaded, 1);
    assert_eq!(report.retries, 0);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].path, MISSING);
    assert_eq!(report.manifest_entries, 1);
    assert_eq!(report.archived_files, 2);

    assert!(archive.exists());
    assert!(!tmp.path().join(STAGING_DIR).exists());
    assert_eq!(archive_files(&archive), vec!["recipe.json", PHOTO]);

    let recipe = read_recipe(&archive);
    let steps = recipe["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);

    let media = &steps[0];
    assert_eq!(media["name"], "media");
    assert_eq!(media["Files"].as_array().unwrap().len(), 1);
    assert_eq!(media["Files"][0]["SourcePath"], PHOTO);
    assert_eq!(media["Files"][0]["TargetPath"], PHOTO);

    let content = &steps[1];
    assert_eq!(content["name"], "content");
    assert_eq!(
        content["data"].as_array().unwrap().len(),
        report.content_items
    );

    let news = content_item(content, "wpcat-3");
    assert_eq!(news["AutoroutePart"]["Path"], "category/news");
    assert_eq!(news["Terms"][0]["ContentItemId"], "wpcat-4");
    let boats = content_item(content, "wptag-7");
    assert_eq!(boats["AutoroutePart"]["Path"], "tag/boats");

    let page = content_item(content, "wppage-12");
    assert_eq!(page["ContentType"], "Page");
    assert_eq!(page["AutoroutePart"]["Path"], "about");

    let post = content_item(content, "wppost-10");
    assert_eq!(post["ContentType"], "BlogPost");
    assert_eq!(post["Published"], true);
    assert_eq!(post["PublishedUtc"], "2020-03-04T09:30:00Z");
    assert_eq!(post["AutoroutePart"]["Path"], "2020/03/04/whats-new");
    assert_eq!(
        post["BlogPost"]["Categories"]["TermContentItemIds"][0],
        "wpcat-4"
    );
    assert_eq!(post["BlogPost"]["Tags"]["TermContentItemIds"][0], "wptag-7");
    let markdown = post["MarkdownBodyPart"]["Markdown"].as_str().unwrap();
    assert!(markdown.contains("**twice**"));

    let draft = content_item(content, "wppost-11");
    assert_eq!(draft["Published"], false);
    assert_eq!(draft["PublishedUtc"], Value::Null);
    assert!(draft["ModifiedUtc"].is_string());
}

#[tokio::test]
async fn etch_play_with_redirects_and_template() {
    let server = asset_server().await;
    let (tmp, export) = setup_export(&server.uri());
    let template = tmp.path().join("template.json");
    fs::write(
        &template,
        r#"{ "name": "EtchPlayBoilerplate", "issetuprecipe": false, "steps": [ { "name": "feature", "enable": ["OrchardCore.Contents"] } ] }"#,
    )
    .unwrap();
    let archive = tmp.path().join("recipe.zip");

    let mut config = test_config(Theme::EtchPlay, true);
    config.recipe.template = Some(template);
    let report = run_migration(&config, &export, tmp.path(), &archive)
        .await
        .unwrap();
    assert_eq!(report.redirects, 3);

    let recipe = read_recipe(&archive);
    assert_eq!(recipe["name"], "EtchPlayBoilerplate");
    assert_eq!(recipe["issetuprecipe"], false);
    let steps = recipe["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 3);
    assert_eq!(steps[0]["name"], "feature");
    assert_eq!(steps[1]["name"], "media");
    let content = &steps[2];

    let post = content_item(content, "wppost-10");
    assert_eq!(post["ContentType"], "NewsPost");
    assert_eq!(post["AutoroutePart"]["Path"], "2020/03/04/whats-new");
    assert_eq!(post["NewsPost"]["Thumbnail"]["Paths"][0], PHOTO);
    let blocks: Value =
        serde_json::from_str(post["NewsPost"]["Content"]["Data"].as_str().unwrap()).unwrap();
    let types: Vec<&str> = blocks["blocks"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["type"].as_str().unwrap())
        .collect();
    assert_eq!(types, vec!["header", "paragraph", "embed"]);
    assert_eq!(blocks["blocks"][2]["data"]["service"], "youtube");

    let page = content_item(content, "wppage-12");
    assert_eq!(page["AutoroutePart"]["Path"], "about-the-harbour");
    let html = &page["Content"]["ContentItems"][0]["Children"]["ContentItems"][0];
    assert_eq!(html["Html"]["Body"]["Html"], "<p>We keep the lights on.</p>");

    let redirect = content_item(content, "redirect-12");
    assert_eq!(redirect["ContentType"], "Redirect");
    assert_eq!(redirect["RedirectPart"]["FromUrl"], "/about");
    assert_eq!(redirect["RedirectPart"]["ToUrl"], "/about-the-harbour");

    let redirect = content_item(content, "redirect-11");
    assert_eq!(redirect["RedirectPart"]["ToUrl"], "/unfinished-thoughts");
    assert_eq!(redirect["Published"], false);
}

#[tokio::test]
async fn invalid_configuration_fails_before_output() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(Theme::TheBlog, false);
    config.theme.list_id = Some("  ".to_string());
    assert!(MigrationContext::new(config).is_err());

    let mut config = test_config(Theme::TheBlog, false);
    config.assets.exclude_globs = vec!["[".to_string()];
    assert!(MigrationContext::new(config).is_err());

    let mut config = test_config(Theme::TheBlog, false);
    config.recipe.template = Some(tmp.path().join("missing.json"));
    assert!(MigrationContext::new(config).is_err());

    assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn malformed_export_is_fatal() {
    let tmp = TempDir::new().unwrap();
    let export = tmp.path().join("export.xml");
    fs::write(&export, "<rss><channel><item><title>Cut off").unwrap();
    let archive = tmp.path().join("recipe.zip");

    let result = run_migration(
        &test_config(Theme::TheBlog, false),
        &export,
        tmp.path(),
        &archive,
    )
    .await;
    assert!(result.is_err());
    assert!(!archive.exists());
}

const DUPLICATE_POSTS: &str = r#"<?xml version="1.0" encoding="UTF-8" ?>
<rss version="2.0" xmlns:content="http://purl.org/rss/1.0/modules/content/" xmlns:wp="http://wordpress.org/export/1.2/">
<channel>
    <title>Twice</title>
    <item>
        <title>First</title>
        <link>http://blog.example.com/first/</link>
        <content:encoded><![CDATA[<p>one</p>]]></content:encoded>
        <wp:post_id>1</wp:post_id>
        <wp:status>publish</wp:status>
        <wp:post_type>post</wp:post_type>
    </item>
    <item>
        <title>Second</title>
        <link>http://blog.example.com/second/</link>
        <content:encoded><![CDATA[<p>two</p>]]></content:encoded>
        <wp:post_id>1</wp:post_id>
        <wp:status>publish</wp:status>
        <wp:post_type>post</wp:post_type>
    </item>
    <item>
        <title>photo</title>
        <wp:post_id>2</wp:post_id>
        <wp:post_type>attachment</wp:post_type>
        <wp:attachment_url>http://assets.invalid/wp-content/uploads/photo.jpg</wp:attachment_url>
    </item>
</channel>
</rss>"#;

#[tokio::test]
async fn content_error_removes_staging_dir() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"jpeg-bytes".to_vec())
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let export = tmp.path().join("export.xml");
    fs::write(
        &export,
        DUPLICATE_POSTS.replace("http://assets.invalid", &server.uri()),
    )
    .unwrap();
    let archive = tmp.path().join("recipe.zip");

    let result = run_migration(
        &test_config(Theme::TheBlog, false),
        &export,
        tmp.path(),
        &archive,
    )
    .await;

    let err = result.unwrap_err();
    assert!(format!("{:#}", err).contains("duplicate content item id: wppost-1"));
    assert!(!tmp.path().join(STAGING_DIR).exists());
    assert!(!archive.exists());
}
