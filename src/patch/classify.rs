//! 视图分类

use crate::config::GuardConfig;
use crate::view::{Callable, ClassRef, DISPATCH, ViewClass};

/// 可调用对象的分类
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// 函数视图（包括已包装的函数视图）
    FunctionView,
    /// 类视图的分发入口
    MethodView {
        /// 具体类
        class: ClassRef,
        /// 入口名称，总是 `dispatch`
        entry: &'static str,
    },
    /// 不是视图，不会被包装
    NotAView,
}

impl Classification {
    /// 是否为视图
    pub fn is_view(&self) -> bool {
        !matches!(self, Classification::NotAView)
    }
}

/// 对路由表中的可调用对象分类
pub fn classify(callable: &Callable) -> Classification {
    match callable {
        Callable::Function(_) | Callable::Guarded(_) => Classification::FunctionView,
        Callable::Dispatch(view) => Classification::MethodView {
            class: view.class().class_ref(),
            entry: DISPATCH,
        },
        Callable::Method(_) => Classification::NotAView,
    }
}

/// 方法名是否是类的视图方法：属于分发约定，或在 MRO 中被标记为额外动作
pub fn is_view_method(class: &ViewClass, name: &str, config: &GuardConfig) -> bool {
    config.is_view_method(name)
        || class
            .resolve_method(name)
            .is_some_and(|(_, method)| method.is_action())
}
