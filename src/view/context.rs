//! 视图调用上下文

use crate::error::ViewResult;
use crate::patch::HandlerKey;
use crate::view::callable::Callable;
use crate::view::request::{Request, Response, ViewArgs};
use std::cell::RefCell;
use std::collections::BTreeSet;

/// 被调用视图的描述
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewInfo {
    /// 视图完整路径，例如 `app.views.UserView.get`
    pub name: String,
    /// 具体类名（函数视图为 `None`）
    pub class: Option<String>,
    /// 被选中的视图方法（函数视图为 `None`）
    pub method: Option<String>,
}

impl ViewInfo {
    /// 函数视图
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: None,
            method: None,
        }
    }

    /// 类视图方法
    pub fn method(name: impl Into<String>, class: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class: Some(class.into()),
            method: Some(method.into()),
        }
    }
}

/// 单次请求内已检查过的视图
///
/// 同一请求的所有嵌套视图调用共享一份记录；每个视图在一次请求中最多检查一次，
/// 转交给其他视图时，目标视图仍按自己的声明检查。
#[derive(Debug, Default)]
pub struct CheckedHandlers {
    keys: RefCell<BTreeSet<HandlerKey>>,
}

impl CheckedHandlers {
    /// 创建空记录
    pub fn new() -> Self {
        Self::default()
    }

    /// 视图是否已在本请求中检查过
    pub fn contains(&self, key: &HandlerKey) -> bool {
        self.keys.borrow().contains(key)
    }

    /// 记录已检查的视图，已存在时返回 `false`
    pub(crate) fn insert(&self, key: HandlerKey) -> bool {
        self.keys.borrow_mut().insert(key)
    }

    /// 已检查的视图数量
    pub fn len(&self) -> usize {
        self.keys.borrow().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.keys.borrow().is_empty()
    }
}

/// 单次请求的视图上下文
///
/// 栈上创建、不跨请求共享
pub struct ViewContext<'a> {
    request: &'a Request,
    args: &'a ViewArgs,
    view: ViewInfo,
    checked: &'a CheckedHandlers,
}

impl<'a> ViewContext<'a> {
    pub(crate) fn new(
        request: &'a Request,
        args: &'a ViewArgs,
        view: ViewInfo,
        checked: &'a CheckedHandlers,
    ) -> Self {
        Self {
            request,
            args,
            view,
            checked,
        }
    }

    /// 当前请求
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// 路由参数
    pub fn args(&self) -> &'a ViewArgs {
        self.args
    }

    /// 获取单个路由参数
    pub fn arg(&self, name: &str) -> Option<&'a str> {
        self.args.get(name).map(String::as_str)
    }

    /// 被调用的视图
    pub fn view(&self) -> &ViewInfo {
        &self.view
    }

    /// 视图是否已在本请求中检查过
    pub fn is_checked(&self, key: &HandlerKey) -> bool {
        self.checked.contains(key)
    }

    /// 记录视图已检查，返回此前是否未检查过
    pub(crate) fn mark_checked(&self, key: &HandlerKey) -> bool {
        self.checked.insert(key.clone())
    }

    /// 本请求的检查记录
    pub fn checked(&self) -> &'a CheckedHandlers {
        self.checked
    }

    /// 在同一请求内转交给另一个视图
    ///
    /// 目标视图共享本请求的检查记录：同一个视图不会被再次检查，
    /// 其他视图按各自的声明检查
    pub fn forward(&self, callable: &Callable) -> ViewResult<Response> {
        callable.invoke(self.request, self.args, self.checked)
    }
}
