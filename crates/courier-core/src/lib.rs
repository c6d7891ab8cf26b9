//! courier-core
//!
//! Core building blocks for the outbound document courier: drain a queue of
//! outbound-document notifications, fetch each document, hand it to the
//! external transport process and dispose of queue item and document
//! according to the outcome.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, message, routing, outcome, decision, state, errors）
//! - **ports**: 抽象化レイヤー（DeliveryQueue, BlobStore, ProcessRunner, Decider, Clock, IdGenerator）
//! - **extract**: routing identifier の抽出戦略（SBDH / party）
//! - **app**: アプリケーションロジック（builder, pipeline, worker_loop, transport, status）
//! - **impls**: 実装（in-memory / local filesystem / tokio process）
//! - **config**: 環境変数からの設定
//! - **worker**: WorkerGroup（複数 PollLoop の起動と停止）

pub mod app;
pub mod config;
pub mod domain;
pub mod extract;
pub mod impls;
pub mod ports;
pub mod worker;

pub use self::config::{Backend, Config, ConfigError, LogLevel};
pub use self::worker::WorkerGroup;
