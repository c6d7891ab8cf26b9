//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてデーモンの処理を実装します。
//!
//! # 主要コンポーネント
//! - **DaemonBuilder**: 構築とワイヤリング（fail-fast）
//! - **Pipeline**: 1 件の処理（fetch→extract→transport→decide→dispose）
//! - **PollLoop**: list→process→sleep のループ
//! - **TransportInvoker**: 外部 transport プロセスの呼び出し
//! - **DocumentStore**: document / receipt の保存・移動・削除

pub mod builder;
pub mod document_store;
pub mod pipeline;
pub mod status;
pub mod transport;
pub mod worker_loop;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Daemon, DaemonBuilder};
pub use self::document_store::DocumentStore;
pub use self::pipeline::{DocumentFate, ItemReport, Pipeline};
pub use self::status::{CycleCounts, CycleReport};
pub use self::transport::{TransportInvoker, TransportSettings};
pub use self::worker_loop::{PollLoop, PollSettings};
