//! 内置规则集提取测试
//!
//! 以各站点的典型标记验证收录条件、标识、链接和字段

use chrono::NaiveDate;

use scrollharvest::driver::{DriverConfig, ReplayHost, ScrollDriver, StopReason};
use scrollharvest::extract::{builtin, extract_page, PageContext, PageExtraction, Profile};
use scrollharvest::parsers::html::html_to_dom;
use scrollharvest::store::{MemoryBackend, RecordStore};

#[allow(dead_code)]
mod common {
    include!("common/mod.rs");
}

use common::{note_id, write_frames, xhs_note, xhs_page, RecordingClock};

fn profile(name: &str) -> Profile {
    builtin(name).unwrap().unwrap()
}

fn run(name: &str, html: &str) -> PageExtraction {
    let profile = profile(name);
    let extractor = profile.extractor(name).unwrap();
    let dom = html_to_dom(html.as_bytes(), "utf-8");
    let page = PageContext::new(&dom, profile.base_url());
    extract_page(&extractor, &page).unwrap()
}

fn wechat_page(account: &str, articles: &[(&str, &str, &str)]) -> String {
    let items: String = articles
        .iter()
        .map(|(title, date, link)| {
            format!(
                r#"<label class="inner_link_article_item">
  <div class="inner_link_article_title"><span class="tag">原创</span><span>{title}</span></div>
  <div class="inner_link_article_date"><span>{date}</span><a href="{link}" target="_blank">查看文章</a></div>
</label>"#
            )
        })
        .collect();
    format!(
        r#"<div class="inner_link_account_msg">{account} 选择其他账号</div><div class="inner_link_article_list">{items}</div>"#
    )
}

#[cfg(test)]
mod passing {
    use super::*;

    #[test]
    fn xhs_note_fields() {
        let id = note_id(1);
        let html = xhs_page(&[xhs_note(&id, "春日穿搭", "1.2万")]);
        let result = run("xhs", &html);

        assert_eq!(result.records.len(), 1);
        let note = &result.records[0];
        assert_eq!(note.id, id);
        assert_eq!(
            note.url,
            format!("https://www.xiaohongshu.com/explore/{}?xsec_token=AB{}", id, id)
        );
        assert_eq!(note.field("title"), Some("春日穿搭"));
        assert_eq!(note.field("author"), Some("小明"));
        assert_eq!(note.field("author_id"), Some("5f1a2b"));
        assert_eq!(note.field("likes"), Some("12000"));
        assert_eq!(
            note.field("cover"),
            Some(format!("https://sns-img.xhscdn.com/{}.jpg", id).as_str())
        );
    }

    #[test]
    fn wechat_articles_use_page_account_and_hash_ids() {
        let html = wechat_page(
            "科技日报",
            &[
                ("第一篇", "2024-03-05", "https://mp.weixin.qq.com/s/AAA"),
                ("第二篇", "2024-03-01", "https://mp.weixin.qq.com/s/BBB"),
            ],
        );
        let result = run("wechat-mp", &html);

        assert_eq!(result.records.len(), 2);
        let first = &result.records[0];
        assert_eq!(first.field("account"), Some("科技日报"));
        assert_eq!(first.field("title"), Some("第一篇"));
        assert_eq!(first.field("date"), Some("2024-03-05"));
        assert_eq!(first.url, "https://mp.weixin.qq.com/s/AAA");
        assert_eq!(first.id.len(), 16);
        assert_ne!(first.id, result.records[1].id);
    }

    #[test]
    fn jimeng_keeps_only_hd_images() {
        let html = r#"
<div class="content-list">
  <div class="image-container-a1"><img src="https://p9.byteimg.com/tos/abc~tplv-aigc_resize:2400:2400.webp?lk3s=8e24&amp;x-expires=1"></div>
  <div class="image-container-a1"><img src="https://p9.byteimg.com/tos/def~tplv-aigc_resize:720:720.webp?lk3s=8e24"></div>
</div>"#;
        let result = run("jimeng", html);

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.skipped, 1);
        assert_eq!(
            result.records[0].url,
            "https://p9.byteimg.com/tos/abc~tplv-aigc_resize:2400:2400.webp"
        );
    }

    #[test]
    fn jimeng_detail_page_badge_includes_everything() {
        let html = r#"
<div class="topActionBar-x"><div class="optItem-y disabled-z">超清</div></div>
<div class="image-container-a1"><img src="https://p9.byteimg.com/tos/def~tplv-resize:720:720.webp"></div>"#;
        let result = run("jimeng", html);
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn douyin_videos() {
        let html = r#"
<ul data-e2e="scroll-list">
  <li><a href="/video/7312345678901234567"><p class="Ja95nb2Z">周末vlog</p><span class="b3Dh2ia8">3.4万</span></a></li>
  <li><a href="/video/7312345678901234568?modeFrom=user"><p>第二条</p></a></li>
</ul>"#;
        let result = run("douyin", html);

        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].id, "7312345678901234567");
        assert_eq!(
            result.records[0].url,
            "https://www.douyin.com/video/7312345678901234567"
        );
        assert_eq!(result.records[0].field("title"), Some("周末vlog"));
        assert_eq!(result.records[0].field("likes"), Some("3.4万"));
        assert_eq!(
            result.records[1].url,
            "https://www.douyin.com/video/7312345678901234568"
        );
        assert_eq!(result.records[1].field("likes"), Some("0"));
    }

    #[test]
    fn replayed_frames_collect_every_note_once() {
        let dir = tempfile::tempdir().unwrap();
        let notes: Vec<String> = (0..9)
            .map(|n| xhs_note(&note_id(n), &format!("笔记{}", n), "10"))
            .collect();
        write_frames(
            dir.path(),
            &[
                xhs_page(&notes[..3]),
                xhs_page(&notes[..6]),
                xhs_page(&notes[..9]),
            ],
        );

        let profile = profile("xhs");
        let extractor = profile.extractor("xhs").unwrap();
        let host = ReplayHost::from_dir(
            dir.path(),
            profile.rules.item_selector.clone(),
            profile.container.clone(),
        )
        .unwrap()
        .with_base_url(profile.base_url());
        let store = RecordStore::open(MemoryBackend::new(), &profile.storage_key, 100).unwrap();
        let config = DriverConfig {
            container_selector: profile.container.clone(),
            loading_selector: profile.loading.clone(),
            ..DriverConfig::default()
        };
        let mut driver =
            ScrollDriver::new(config, extractor, store, host, RecordingClock::default());

        let summary = driver.run().unwrap();

        assert_eq!(summary.reason, Some(StopReason::Exhausted));
        assert_eq!(driver.store().len(), 9);
        assert_eq!(driver.host().frame_index(), 2);
        assert_eq!(
            driver.store().latest().and_then(|r| r.field("title")),
            Some("笔记8")
        );
    }

    #[test]
    fn replay_stops_at_date_cutoff() {
        let dir = tempfile::tempdir().unwrap();
        let a = ("新文章", "2024-03-05", "https://mp.weixin.qq.com/s/A");
        let b = ("旧文章", "2024-02-20", "https://mp.weixin.qq.com/s/B");
        write_frames(
            dir.path(),
            &[wechat_page("号", &[a]), wechat_page("号", &[a, b])],
        );

        let profile = profile("wechat-mp");
        let extractor = profile
            .extractor("wechat-mp")
            .unwrap()
            .with_since("date", NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        let host = ReplayHost::from_dir(
            dir.path(),
            profile.rules.item_selector.clone(),
            profile.container.clone(),
        )
        .unwrap();
        let store = RecordStore::open(MemoryBackend::new(), &profile.storage_key, 100).unwrap();
        let config = DriverConfig {
            container_selector: profile.container.clone(),
            ..DriverConfig::default()
        };
        let mut driver =
            ScrollDriver::new(config, extractor, store, host, RecordingClock::default());

        let summary = driver.run().unwrap();

        assert_eq!(summary.reason, Some(StopReason::CutoffReached));
        assert_eq!(driver.store().len(), 1);
        assert_eq!(driver.store().latest().and_then(|r| r.field("title")), Some("新文章"));
    }
}

#[cfg(test)]
mod failing {
    use super::*;

    #[test]
    fn xhs_items_without_profile_link_are_skipped() {
        let html = xhs_page(&[
            r#"<section class="note-item"><a href="/explore/ad">广告</a></section>"#.to_string(),
            xhs_note(&note_id(2), "正常", "1"),
        ]);
        let result = run("xhs", &html);
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.skipped, 1);
    }

    #[test]
    fn xhs_short_ids_are_skipped() {
        let html = xhs_page(&[xhs_note("abc123", "短标识", "1")]);
        let result = run("xhs", &html);
        assert!(result.records.is_empty());
        assert_eq!(result.skipped, 1);
    }
}
