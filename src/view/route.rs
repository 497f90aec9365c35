//! 路由表
//!
//! 路由表是可能嵌套的（`include`）`模式 → 可调用对象` 列表。
//! 模式中的 `<name>` 段捕获为视图参数。

use crate::error::ViewError;
use crate::view::callable::Callable;
use crate::view::request::{Request, Response, ViewArgs};

/// 单条路由
#[derive(Debug, Clone)]
pub struct Route {
    /// URL 模式，例如 `users/<pk>/`
    pub pattern: String,
    /// 路由名称，用于反解
    pub name: Option<String>,
    /// 可调用对象
    pub callable: Callable,
}

/// 路由表条目
#[derive(Debug, Clone)]
pub enum RouteEntry {
    /// 单条路由
    Route(Route),
    /// 以前缀挂载的子路由表
    Include {
        /// 路径前缀
        prefix: String,
        /// 子路由表
        table: RouteTable,
    },
}

/// 路由表
///
/// # 示例
///
/// ```rust
/// use rolegate::view::{FunctionView, Request, Response, RouteTable};
///
/// let users = RouteTable::new().named_route(
///     "<pk>/",
///     "user-detail",
///     FunctionView::new("app.views", "user_detail", |ctx| {
///         Ok(Response::ok(ctx.arg("pk").unwrap_or_default()))
///     }),
/// );
/// let routes = RouteTable::new().include("users/", users);
///
/// assert_eq!(routes.handle(&Request::get("/users/42/")).body, "42");
/// assert_eq!(routes.handle(&Request::get("/missing/")).status, 404);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn join(prefix: &str, pattern: &str) -> String {
    let mut joined = segments(prefix);
    joined.extend(segments(pattern));
    joined.join("/")
}

/// 匹配模式，成功时返回捕获的参数
fn match_pattern(pattern: &[&str], path: &[&str]) -> Option<ViewArgs> {
    if pattern.len() != path.len() {
        return None;
    }

    let mut args = ViewArgs::new();
    for (expected, actual) in pattern.iter().zip(path) {
        match expected
            .strip_prefix('<')
            .and_then(|name| name.strip_suffix('>'))
        {
            Some(name) => {
                args.insert(name.to_string(), actual.to_string());
            }
            None if expected == actual => {}
            None => return None,
        }
    }
    Some(args)
}

impl RouteTable {
    /// 创建空路由表
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加路由
    pub fn route(mut self, pattern: impl Into<String>, callable: impl Into<Callable>) -> Self {
        self.entries.push(RouteEntry::Route(Route {
            pattern: pattern.into(),
            name: None,
            callable: callable.into(),
        }));
        self
    }

    /// 添加命名路由
    pub fn named_route(
        mut self,
        pattern: impl Into<String>,
        name: impl Into<String>,
        callable: impl Into<Callable>,
    ) -> Self {
        self.entries.push(RouteEntry::Route(Route {
            pattern: pattern.into(),
            name: Some(name.into()),
            callable: callable.into(),
        }));
        self
    }

    /// 挂载子路由表
    pub fn include(mut self, prefix: impl Into<String>, table: RouteTable) -> Self {
        self.entries.push(RouteEntry::Include {
            prefix: prefix.into(),
            table,
        });
        self
    }

    /// 条目
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// 展开后的所有路由（完整模式、可调用对象）
    pub fn routes(&self) -> Vec<(String, &Callable)> {
        let mut out = Vec::new();
        self.collect("", &mut out);
        out
    }

    fn collect<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Callable)>) {
        for entry in &self.entries {
            match entry {
                RouteEntry::Route(route) => out.push((join(prefix, &route.pattern), &route.callable)),
                RouteEntry::Include { prefix: inner, table } => {
                    table.collect(&join(prefix, inner), out)
                }
            }
        }
    }

    /// 展开后的所有路由（可修改）
    pub fn routes_mut(&mut self) -> Vec<(String, &mut Callable)> {
        let mut out = Vec::new();
        self.collect_mut("", &mut out);
        out
    }

    fn collect_mut<'a>(&'a mut self, prefix: &str, out: &mut Vec<(String, &'a mut Callable)>) {
        for entry in &mut self.entries {
            match entry {
                RouteEntry::Route(route) => {
                    out.push((join(prefix, &route.pattern), &mut route.callable))
                }
                RouteEntry::Include { prefix: inner, table } => {
                    let nested = join(prefix, inner);
                    table.collect_mut(&nested, out)
                }
            }
        }
    }

    /// 路由数量（含嵌套）
    pub fn len(&self) -> usize {
        self.routes().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 解析路径，返回第一个匹配的可调用对象与捕获参数
    pub fn resolve(&self, path: &str) -> Option<(&Callable, ViewArgs)> {
        let path = segments(path);
        self.routes().into_iter().find_map(|(pattern, callable)| {
            match_pattern(&segments(&pattern), &path).map(|args| (callable, args))
        })
    }

    /// 反解 URL
    ///
    /// `name` 可以是路由名称、可调用对象的名称或完整路径
    pub fn reverse(&self, name: &str, args: &ViewArgs) -> Option<String> {
        let (pattern, _) = self
            .find_named(name)
            .or_else(|| {
                self.routes()
                    .into_iter()
                    .find(|(_, c)| c.meta().name == name || c.meta().path() == name)
            })?;

        let mut url = String::from("/");
        for segment in segments(&pattern) {
            let value = match segment
                .strip_prefix('<')
                .and_then(|s| s.strip_suffix('>'))
            {
                Some(param) => args.get(param)?.as_str(),
                None => segment,
            };
            url.push_str(value);
            url.push('/');
        }
        Some(url)
    }

    fn find_named(&self, name: &str) -> Option<(String, &Callable)> {
        fn walk<'a>(
            table: &'a RouteTable,
            prefix: &str,
            name: &str,
        ) -> Option<(String, &'a Callable)> {
            table.entries.iter().find_map(|entry| match entry {
                RouteEntry::Route(route) if route.name.as_deref() == Some(name) => {
                    Some((join(prefix, &route.pattern), &route.callable))
                }
                RouteEntry::Route(_) => None,
                RouteEntry::Include { prefix: inner, table } => {
                    walk(table, &join(prefix, inner), name)
                }
            })
        }
        walk(self, "", name)
    }

    /// 处理请求：解析路由并调用，错误渲染为标准响应
    pub fn handle(&self, request: &Request) -> Response {
        let Some((callable, args)) = self.resolve(request.path()) else {
            return Response::from_error(&ViewError::NotFound(request.path().to_string()));
        };

        match callable.call(request, &args) {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(
                    path = request.path(),
                    view = %callable.meta().path(),
                    error = %error,
                    "view returned an error"
                );
                Response::from_error(&error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::FunctionView;

    fn echo(name: &'static str) -> FunctionView {
        FunctionView::new("app.views", name, move |ctx| {
            let args: Vec<_> = ctx.args().values().cloned().collect();
            Ok(Response::ok(format!("{}:{}", name, args.join(","))))
        })
    }

    fn table() -> RouteTable {
        let api = RouteTable::new()
            .named_route("users/", "user-list", echo("list_users"))
            .named_route("users/<pk>/", "user-detail", echo("user_detail"));
        RouteTable::new()
            .route("", echo("index"))
            .include("api/v1/", api)
    }

    #[test]
    fn test_nested_routes_flattened() {
        let routes = table();
        let patterns: Vec<_> = routes.routes().into_iter().map(|(p, _)| p).collect();
        assert_eq!(patterns, vec!["", "api/v1/users", "api/v1/users/<pk>"]);
        assert_eq!(routes.len(), 3);
    }

    #[test]
    fn test_resolve_captures_args() {
        let routes = table();
        let (callable, args) = routes.resolve("/api/v1/users/7/").unwrap();
        assert_eq!(callable.meta().name, "user_detail");
        assert_eq!(args.get("pk").map(String::as_str), Some("7"));
        assert!(routes.resolve("/api/v2/users/").is_none());
    }

    #[test]
    fn test_reverse_by_route_name_and_view_name() {
        let routes = table();
        let mut args = ViewArgs::new();
        args.insert("pk".into(), "3".into());

        assert_eq!(routes.reverse("user-detail", &args).as_deref(), Some("/api/v1/users/3/"));
        assert_eq!(routes.reverse("list_users", &args).as_deref(), Some("/api/v1/users/"));
        assert_eq!(
            routes.reverse("app.views.user_detail", &args).as_deref(),
            Some("/api/v1/users/3/")
        );
        // 缺少参数
        assert!(routes.reverse("user-detail", &ViewArgs::new()).is_none());
        assert!(routes.reverse("nope", &args).is_none());
    }

    #[test]
    fn test_handle() {
        let routes = table();
        assert_eq!(routes.handle(&Request::get("/")).body, "index:");
        assert_eq!(routes.handle(&Request::get("/api/v1/users/9")).body, "user_detail:9");

        let missing = routes.handle(&Request::get("/nothing"));
        assert_eq!(missing.status, 404);
        assert_eq!(missing.body, "Not found: /nothing");
    }
}
