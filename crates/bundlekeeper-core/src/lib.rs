//! bundlekeeper-core
//!
//! Storage lifecycle management for precise code-intel uploads and bundles.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, state, upload, layout, disk, report, errors）
//! - **ports**: 抽象化レイヤー（UploadStore, BundleFileStore, Clock, 戦略 trait）
//! - **impls**: 実装（LocalBundleDir, InMemoryUploadStore など）
//! - **app**: Janitor / UploadResetter ループと AppBuilder

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
