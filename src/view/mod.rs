//! # 视图模块
//!
//! 宿主 Web 框架的视图层模型：
//!
//! - **请求/响应**: [`Request`]、[`Response`]
//! - **函数视图**: [`FunctionView`]
//! - **类视图**: [`ViewClass`] 及其分发入口 [`DispatchView`]
//! - **路由表**: [`RouteTable`]，支持嵌套与 URL 反解

mod callable;
mod class;
mod context;
mod request;
mod route;

pub use callable::{Callable, CallableId, CallableMeta, FunctionView, ViewFn};
pub use class::{
    BoundMethod, ClassId, ClassRef, DEFAULT_HTTP_METHOD_NAMES, DISPATCH, DispatchView,
    ViewClass, ViewClassBuilder, ViewMethod, api_view,
};
pub use context::{CheckedHandlers, ViewContext, ViewInfo};
pub use request::{Request, Response, ViewArgs};
pub use route::{Route, RouteEntry, RouteTable};
