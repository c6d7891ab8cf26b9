//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryDeliveryQueue** / **InMemoryBlobStore**: 開発・テスト用
//! - **LocalDeliveryQueue** / **LocalBlobStore**: ローカルファイルシステム上のバックエンド
//! - **TokioProcessRunner**: 外部 transport プロセスの実行
//!
//! Hosted queue/storage services plug in by implementing the same ports.

pub mod fs_blob;
pub mod fs_queue;
pub mod inmem_blob;
pub mod inmem_delivery;
pub mod process;

pub use self::fs_blob::LocalBlobStore;
pub use self::fs_queue::LocalDeliveryQueue;
pub use self::inmem_blob::InMemoryBlobStore;
pub use self::inmem_delivery::InMemoryDeliveryQueue;
pub use self::process::TokioProcessRunner;
