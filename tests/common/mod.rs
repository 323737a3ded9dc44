// 集成测试公共模块
//
// 脚本化页面宿主、记录等待的时钟和保存页面帧的辅助函数

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use scrollharvest::core::Record;
use scrollharvest::driver::{Clock, PageHost, PageMetrics};
use scrollharvest::error::{HarvestError, HarvestResult};
use scrollharvest::extract::{Extractor, PageContext};
use scrollharvest::parsers::html::{get_node_attr, html_to_dom, ElementRef, Html, Selector};
use scrollharvest::store::StorageBackend;

/// 脚本中的一帧
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub items: usize,
    /// 进入该帧后，前若干次检查显示加载指示器
    pub loading_checks: usize,
}

impl Frame {
    pub fn items(items: usize) -> Self {
        Frame {
            items,
            loading_checks: 0,
        }
    }

    pub fn loading(items: usize, checks: usize) -> Self {
        Frame {
            items,
            loading_checks: checks,
        }
    }
}

/// 每次滚动前进一帧，停在最后一帧
pub struct ScriptedHost {
    frames: Vec<Frame>,
    index: usize,
    checks_on_frame: usize,
    scroll_y: u64,
    pub scrolls: usize,
    pub has_container: bool,
}

impl ScriptedHost {
    pub fn new(frames: Vec<Frame>) -> Self {
        ScriptedHost {
            frames,
            index: 0,
            checks_on_frame: 0,
            scroll_y: 0,
            scrolls: 0,
            has_container: true,
        }
    }

    fn frame(&self) -> Frame {
        self.frames[self.index]
    }
}

impl PageHost for ScriptedHost {
    fn document(&mut self) -> HarvestResult<Html> {
        let frame = self.frame();
        let mut html = String::from("<div id=\"feed\">");
        for i in 0..frame.items {
            html.push_str(&format!("<div class=\"item\" data-id=\"item-{}\"></div>", i));
        }
        html.push_str("</div>");
        if self.checks_on_frame <= frame.loading_checks && self.checks_on_frame > 0 {
            html.push_str("<div class=\"loading\">加载中</div>");
        }
        Ok(html_to_dom(html.as_bytes(), "utf-8"))
    }

    fn metrics(&mut self, _container: Option<&Selector>) -> HarvestResult<PageMetrics> {
        self.checks_on_frame += 1;
        let height = self.frame().items as u64 * 100;
        Ok(PageMetrics {
            container_height: self.has_container.then_some(height),
            scroll_y: self.scroll_y,
            viewport_height: 800,
            document_height: height + 200,
        })
    }

    fn scroll_by(&mut self, step: u32) -> HarvestResult<()> {
        self.scrolls += 1;
        self.scroll_y += step as u64;
        if self.index + 1 < self.frames.len() {
            self.index += 1;
            self.checks_on_frame = 0;
        }
        Ok(())
    }
}

/// 只记录等待时长，不真正休眠
#[derive(Debug, Default)]
pub struct RecordingClock {
    pub pauses: Vec<Duration>,
}

impl Clock for RecordingClock {
    fn pause(&mut self, duration: Duration) {
        self.pauses.push(duration);
    }
}

/// 以 `data-id` 作为标识的提取器
pub struct DataIdExtractor {
    selector: Selector,
}

impl DataIdExtractor {
    pub fn new() -> Self {
        DataIdExtractor {
            selector: Selector::parse(".item").unwrap(),
        }
    }
}

impl Extractor for DataIdExtractor {
    fn name(&self) -> &str {
        "data-id"
    }

    fn item_selector(&self) -> &Selector {
        &self.selector
    }

    fn extract(&self, node: ElementRef<'_>, _page: &PageContext<'_>) -> HarvestResult<Record> {
        let id = get_node_attr(node, "data-id")
            .ok_or_else(|| HarvestError::ExtractionSkipped("missing data-id".to_string()))?;
        let url = format!("https://feed.example/{}", id);
        Ok(Record::new(id, url))
    }
}

/// 读取正常、写入总是失败的后端
#[derive(Clone, Default)]
pub struct ReadOnlyBackend {
    pub save_attempts: Rc<RefCell<usize>>,
}

impl StorageBackend for ReadOnlyBackend {
    fn load(&self, _key: &str) -> HarvestResult<Option<String>> {
        Ok(None)
    }

    fn save(&self, _key: &str, _text: &str) -> HarvestResult<()> {
        *self.save_attempts.borrow_mut() += 1;
        Err(HarvestError::PersistenceFailure("disk full".to_string()))
    }

    fn remove(&self, _key: &str) -> HarvestResult<()> {
        Ok(())
    }
}

/// 小红书个人主页的一条笔记
pub fn xhs_note(note_id: &str, title: &str, likes: &str) -> String {
    format!(
        r#"<section class="note-item">
  <a class="cover" href="/user/profile/5f1a2b/{note_id}?xsec_token=AB{note_id}"><img src="//sns-img.xhscdn.com/{note_id}.jpg"></a>
  <div class="footer">
    <a class="title"><span>{title}</span></a>
    <div class="author-wrapper">
      <a class="author" href="/user/profile/5f1a2b?channel=home"><span class="name">小明</span></a>
      <span class="like-wrapper"><span class="count">{likes}</span></span>
    </div>
  </div>
</section>"#
    )
}

/// 小红书个人主页，笔记位于 `#userPostedFeeds`
pub fn xhs_page(notes: &[String]) -> String {
    format!(
        "<html><body><div id=\"userPostedFeeds\">{}</div></body></html>",
        notes.concat()
    )
}

/// 24 位十六进制笔记标识
pub fn note_id(n: usize) -> String {
    format!("64b7c2e1000000001f{:06x}", n)
}

/// 把帧写为 `frame_000.html`、`frame_001.html`……
pub fn write_frames(dir: &Path, frames: &[String]) {
    fs::create_dir_all(dir).unwrap();
    for (i, frame) in frames.iter().enumerate() {
        fs::write(dir.join(format!("frame_{:03}.html", i)), frame).unwrap();
    }
}
