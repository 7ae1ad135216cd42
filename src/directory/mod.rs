//! 代理目錄：探索遠端代理端點、取得並快取其 agent card。
//!
//! 此模組負責依 URL 去重的代理清單、目前作用中的代理，
//! 以及啟動時併發載入預設代理的流程。

/// `bootstrap` 模組：解析預設代理 URL 清單，並為每個 URL 啟動獨立的註冊任務。
pub mod bootstrap;
/// `card` 模組：定義 `AgentCard`，協定相關欄位原封不動保留。
pub mod card;
/// `error` 模組：目錄與網路呼叫的錯誤類型。
pub mod error;
/// `fetch` 模組：HTTP 呼叫抽象，以及在每個請求附加標頭的代理包裝。
pub mod fetch;
/// `manager` 模組：提供 `DirectoryManager`，串接解析、註冊、通知與狀態快照。
pub mod manager;
/// `resolver` 模組：對指定 URL 進行探索並解析代理的自我描述文件。
pub mod resolver;
/// `store` 模組：以 URL 為鍵、保持順序的代理清單與作用中選取。
pub mod store;

// 將常用項目提升到 `directory` 頂層。
pub use bootstrap::{BootstrapHandle, BootstrapOutcome, BootstrapReport, parse_agent_urls};
pub use card::AgentCard;
pub use error::{DirectoryError, FetchError};
pub use fetch::{Fetch, FetchRequest, FetchResponse, HttpFetch, ProxyFetch, create_proxy_fetch};
pub use manager::{DirectoryEvent, DirectoryManager, DirectorySnapshot};
pub use resolver::{AgentClient, Resolved, resolve};
pub use store::AgentDirectory;
