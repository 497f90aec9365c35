//! 请求与响应
//!
//! 宿主框架请求/响应对象的最小替身，只保留权限检查需要的字段。

use crate::error::ViewError;
use crate::rbac::Principal;
use std::collections::{BTreeMap, HashMap};

/// 路由捕获的视图参数
pub type ViewArgs = BTreeMap<String, String>;

/// 请求
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: String,
    path: String,
    principal: Option<Principal>,
    headers: HashMap<String, String>,
}

impl Request {
    /// 创建请求，方法名统一为大写
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            principal: None,
            headers: HashMap::new(),
        }
    }

    /// GET 请求
    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    /// POST 请求
    pub fn post(path: impl Into<String>) -> Self {
        Self::new("POST", path)
    }

    /// PUT 请求
    pub fn put(path: impl Into<String>) -> Self {
        Self::new("PUT", path)
    }

    /// DELETE 请求
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path)
    }

    /// 附加已认证主体
    pub fn with_principal(mut self, principal: Principal) -> Self {
        self.principal = Some(principal);
        self
    }

    /// 添加请求头（名称不区分大小写）
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// 请求方法
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 请求路径
    pub fn path(&self) -> &str {
        &self.path
    }

    /// 附加的主体
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// 获取请求头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// 响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// 状态码
    pub status: u16,
    /// 响应体
    pub body: String,
}

impl Response {
    /// 创建响应
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 200 响应
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    /// 将视图错误渲染为标准错误响应
    ///
    /// 内部错误不会把细节写入响应体
    pub fn from_error(error: &ViewError) -> Self {
        match error {
            ViewError::Handler(_) => Self::new(500, "Internal Server Error"),
            other => Self::new(other.status_code(), other.to_string()),
        }
    }

    /// 是否为 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl From<ViewError> for Response {
    fn from(error: ViewError) -> Self {
        Response::from_error(&error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_normalizes_method_and_headers() {
        let request = Request::new("get", "/users").with_header("X-User", "alice");
        assert_eq!(request.method(), "GET");
        assert_eq!(request.path(), "/users");
        assert_eq!(request.header("x-user"), Some("alice"));
        assert!(request.principal().is_none());
    }

    #[test]
    fn test_forbidden_response_has_no_detail() {
        let response = Response::from_error(&ViewError::PermissionDenied);
        assert_eq!(response.status, 403);
        assert_eq!(
            response.body,
            "You do not have permission to perform this action."
        );
    }

    #[test]
    fn test_handler_error_is_not_leaked() {
        let response: Response = ViewError::handler("password column missing").into();
        assert_eq!(response.status, 500);
        assert!(!response.body.contains("password"));
    }
}
