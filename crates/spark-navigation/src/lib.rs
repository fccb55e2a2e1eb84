//! # spark-navigation
//!
//! ## 定位与职责（Why）
//! - 在路由驱动的主从（master/detail）页面中，把每一次路由命中协调为“页面应当绑定哪个实体上下文”；
//! - 负责语义路径到技术路径的解析、多列布局下 keep-alive 上下文的授予与释放，以及路由未变化时的
//!   局部副作用刷新。
//!
//! ## 架构嵌入（Where）
//! - `path`：路由参数 + 上下文模式 → 绝对绑定路径（纯函数）；
//! - `semantic`：单槽缓存 + 语义键查询，把人类可读的键值换成技术主键；
//! - `binder`：核心状态机 [`ContextBinder`](binder::ContextBinder)，决定复用、新建、保活或原地刷新；
//! - `side_effects`：遍历依赖绑定树，计算需要重新拉取的最小路径集合；
//! - `data`：数据访问协作方的契约（`DataModel`/`DataContext`），由宿主注入具体实现；
//! - `config`/`telemetry`/`error`：引擎配置、`tracing` 安装入口与统一错误域。
//!
//! ## 调度模型（What）
//! - 单线程协作式：所有状态跃迁都由路由命中事件或生命周期回调驱动；
//! - 唯一的挂起点是语义路径查询、副作用刷新以及异步上下文的等待，其余决策同步完成。

pub mod binder;
pub mod config;
pub mod data;
pub mod error;
pub mod filter;
pub mod keep_alive;
pub mod navigation;
pub mod path;
pub mod selection;
pub mod semantic;
pub mod side_effects;
pub mod telemetry;

pub use binder::{BindOutcome, ContextBinder, ContextBinderBuilder};
pub use config::EngineSettings;
pub use data::{ContextRef, DataContext, DataModel};
pub use error::{BindingError, DataError, ErrorClass};
pub use navigation::{NavigationParameters, RouteMatchedEvent, TargetInformation};
pub use path::{BindingPath, build_path};
pub use semantic::{SemanticCache, SemanticPathResolver};
pub use side_effects::SideEffectsRefresher;
