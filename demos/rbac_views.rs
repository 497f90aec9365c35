//! 视图权限示例
//!
//! 展示如何声明角色与视图权限、安装守卫并处理请求。
//!
//! 运行: RUST_LOG=debug cargo run --example rbac_views

use std::sync::Arc;

use rolegate::audit::{EventType, InMemoryAuditLogger};
use rolegate::patch::PatchEngine;
use rolegate::rbac::{PolicyRegistry, Principal, RoleDefinition, RoleRules, Rule};
use rolegate::view::{FunctionView, Request, Response, RouteTable, ViewArgs, ViewClass};
use tracing_subscriber::EnvFilter;

fn build_routes() -> Result<RouteTable, rolegate::Error> {
    // 共享的基类：所有子类的 get 都在这里检查
    let base = ViewClass::builder("blog.views", "ArticleView")
        .method("get", |ctx| {
            Ok(Response::ok(format!("article {}", ctx.arg("pk").unwrap_or("?"))))
        })
        .method("delete", |ctx| {
            Ok(Response::ok(format!("deleted {}", ctx.arg("pk").unwrap_or("?"))))
        })
        .view_permissions("get", RoleRules::allowed(["anon", "user"]))
        .view_permissions("delete", RoleRules::allowed(["admin", "editor"]))
        .build()?;

    let drafts = ViewClass::builder("blog.views", "DraftView")
        .base(&base)
        .view_permissions("get", RoleRules::allowed(["editor", "admin"]))
        .build()?;

    let profile = FunctionView::new("blog.views", "profile", |ctx| {
        Ok(Response::ok(format!("profile of {}", ctx.arg("user").unwrap_or("?"))))
    })
    .permissions(
        RoleRules::new()
            .allow("admin")
            .rule("user", Rule::principal_matches_arg("user")),
    );

    let articles = RouteTable::new()
        .named_route("<pk>/", "article-detail", base.as_view())
        .named_route("drafts/<pk>/", "draft-detail", drafts.as_view());

    Ok(RouteTable::new()
        .include("articles/", articles)
        .named_route("profile/<user>/", "profile", profile))
}

fn show(routes: &RouteTable, label: &str, request: Request) {
    let response = routes.handle(&request);
    let icon = if response.is_success() { "✅" } else { "🚫" };
    println!(
        "   {} {:<28} {} {} -> {} {}",
        icon,
        label,
        request.method(),
        request.path(),
        response.status,
        response.body
    );
}

fn main() -> Result<(), rolegate::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("🔐 视图权限示例\n");

    let registry = Arc::new(
        PolicyRegistry::builder()
            .default_roles()
            .role(RoleDefinition::group("editor", "editors").description("Blog editors"))
            .build()?,
    );

    let audit = Arc::new(InMemoryAuditLogger::new());
    let engine = PatchEngine::builder(registry)
        .audit_logger(audit.clone())
        .build();

    let mut routes = build_routes()?;
    let report = engine.patch(&mut routes)?;
    println!("📦 安装结果");
    println!("   函数视图: {}", report.functions_wrapped);
    println!("   分发入口: {}", report.dispatch_attached);
    println!(
        "   插入点: 新安装 {} / 复用 {}",
        report.insertion_points_installed, report.insertion_points_reused
    );
    println!();

    let alice = Principal::new("alice");
    let erin = Principal::new("erin").with_group("editors");
    let root = Principal::new("root").superuser();

    println!("🌐 请求");
    show(&routes, "匿名读取文章", Request::get("/articles/1/"));
    show(&routes, "匿名读取草稿", Request::get("/articles/drafts/1/"));
    show(
        &routes,
        "编辑读取草稿",
        Request::get("/articles/drafts/1/").with_principal(erin.clone()),
    );
    show(
        &routes,
        "普通用户删除文章",
        Request::delete("/articles/1/").with_principal(alice.clone()),
    );
    show(
        &routes,
        "编辑删除文章",
        Request::delete("/articles/1/").with_principal(erin),
    );
    show(
        &routes,
        "查看自己的资料",
        Request::get("/profile/alice/").with_principal(alice.clone()),
    );
    show(
        &routes,
        "查看他人的资料",
        Request::get("/profile/root/").with_principal(alice),
    );
    show(
        &routes,
        "管理员查看资料",
        Request::get("/profile/alice/").with_principal(root),
    );
    println!();

    let mut args = ViewArgs::new();
    args.insert("pk".to_string(), "7".to_string());
    println!("🔗 反解");
    println!("   draft-detail -> {:?}", routes.reverse("draft-detail", &args));
    println!("   DraftView    -> {:?}", routes.reverse("DraftView", &args));
    println!();

    let stats = audit.get_stats();
    println!("📝 审计");
    println!("   事件总数: {}", stats.total_events);
    println!(
        "   拒绝: {}",
        audit.get_events_by_type(&EventType::PermissionDenied).len()
    );
    println!(
        "   允许: {}",
        audit.get_events_by_type(&EventType::PermissionGranted).len()
    );

    Ok(())
}
