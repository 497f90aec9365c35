//! 规则谓词模块
//!
//! 一条权限规则要么是静态布尔值，要么是在请求上下文上求值的动态谓词。
//! 求值结果用 [`RuleOutcome`] 显式表达，谓词失败不会以 panic 或隐藏的方式传播。

use crate::error::PredicateError;
use crate::rbac::principal::Principal;
use crate::view::{Request, ViewArgs, ViewInfo};
use std::fmt;
use std::sync::Arc;

/// 规则求值上下文
///
/// 包含当前主体、请求、被调用视图的信息以及路由捕获的参数
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    principal: Option<&'a Principal>,
    request: &'a Request,
    view: &'a ViewInfo,
    args: &'a ViewArgs,
}

impl<'a> RuleContext<'a> {
    /// 创建新的求值上下文
    pub fn new(
        principal: Option<&'a Principal>,
        request: &'a Request,
        view: &'a ViewInfo,
        args: &'a ViewArgs,
    ) -> Self {
        Self {
            principal,
            request,
            view,
            args,
        }
    }

    /// 当前主体（`None` 表示匿名）
    pub fn principal(&self) -> Option<&'a Principal> {
        self.principal
    }

    /// 当前请求
    pub fn request(&self) -> &'a Request {
        self.request
    }

    /// 被调用的视图
    pub fn view(&self) -> &'a ViewInfo {
        self.view
    }

    /// 路由参数
    pub fn args(&self) -> &'a ViewArgs {
        self.args
    }

    /// 获取单个路由参数
    pub fn arg(&self, name: &str) -> Option<&'a str> {
        self.args.get(name).map(String::as_str)
    }
}

/// 谓词求值结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    /// 规则允许
    Allowed,
    /// 规则拒绝
    Denied,
    /// 谓词求值失败，按条件不满足处理
    EvaluationFailed(PredicateError),
}

impl RuleOutcome {
    /// 是否允许
    pub fn is_allowed(&self) -> bool {
        matches!(self, RuleOutcome::Allowed)
    }

    /// 是否求值失败
    pub fn is_failed(&self) -> bool {
        matches!(self, RuleOutcome::EvaluationFailed(_))
    }
}

impl From<Result<bool, PredicateError>> for RuleOutcome {
    fn from(result: Result<bool, PredicateError>) -> Self {
        match result {
            Ok(true) => RuleOutcome::Allowed,
            Ok(false) => RuleOutcome::Denied,
            Err(e) => RuleOutcome::EvaluationFailed(e),
        }
    }
}

/// 谓词失败记录
///
/// 用于诊断：记录是哪个角色或规则的谓词失败了
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateFailure {
    /// 失败的角色名或规则名
    pub subject: String,
    /// 失败原因
    pub error: PredicateError,
}

impl PredicateFailure {
    /// 创建失败记录
    pub fn new(subject: impl Into<String>, error: PredicateError) -> Self {
        Self {
            subject: subject.into(),
            error,
        }
    }
}

type PredicateFn = dyn Fn(&RuleContext<'_>) -> Result<bool, PredicateError> + Send + Sync;

/// 命名的动态谓词
#[derive(Clone)]
pub struct Predicate {
    name: String,
    func: Arc<PredicateFn>,
}

impl Predicate {
    /// 创建动态谓词
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// 谓词名称
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 求值
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        (self.func)(ctx).into()
    }
}

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Predicate").field("name", &self.name).finish()
    }
}

/// 权限规则
///
/// # 示例
///
/// ```rust
/// use rolegate::rbac::Rule;
///
/// let always = Rule::allow();
/// let owner_only = Rule::principal_matches_arg("user_id");
/// assert!(always.is_static());
/// assert!(!owner_only.is_static());
/// ```
#[derive(Debug, Clone)]
pub enum Rule {
    /// 静态规则
    Static(bool),
    /// 动态谓词
    Dynamic(Predicate),
}

impl Rule {
    /// 始终允许
    pub fn allow() -> Self {
        Rule::Static(true)
    }

    /// 始终拒绝
    pub fn deny() -> Self {
        Rule::Static(false)
    }

    /// 动态规则
    pub fn when<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&RuleContext<'_>) -> Result<bool, PredicateError> + Send + Sync + 'static,
    {
        Rule::Dynamic(Predicate::new(name, func))
    }

    /// 对象级规则：主体 ID 必须等于指定路由参数
    ///
    /// 缺少该参数视为求值失败；匿名请求直接拒绝
    pub fn principal_matches_arg(arg: impl Into<String>) -> Self {
        let arg = arg.into();
        let name = format!("principal_matches_arg:{}", arg);
        Rule::when(name, move |ctx| {
            let value = ctx
                .arg(&arg)
                .ok_or_else(|| PredicateError::new(format!("missing view argument '{}'", arg)))?;
            Ok(ctx.principal().is_some_and(|p| p.id() == value))
        })
    }

    /// 是否为静态规则
    pub fn is_static(&self) -> bool {
        matches!(self, Rule::Static(_))
    }

    /// 规则名称（用于诊断）
    pub fn describe(&self) -> String {
        match self {
            Rule::Static(true) => "allow".to_string(),
            Rule::Static(false) => "deny".to_string(),
            Rule::Dynamic(p) => p.name().to_string(),
        }
    }

    /// 求值
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> RuleOutcome {
        match self {
            Rule::Static(true) => RuleOutcome::Allowed,
            Rule::Static(false) => RuleOutcome::Denied,
            Rule::Dynamic(predicate) => predicate.evaluate(ctx),
        }
    }
}

impl From<bool> for Rule {
    fn from(value: bool) -> Self {
        Rule::Static(value)
    }
}

impl From<Predicate> for Rule {
    fn from(predicate: Predicate) -> Self {
        Rule::Dynamic(predicate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (Request, ViewInfo, ViewArgs) {
        let request = Request::get("/users/42");
        let view = ViewInfo::function("app.views.user_detail");
        let mut args = ViewArgs::new();
        args.insert("user_id".to_string(), "42".to_string());
        (request, view, args)
    }

    #[test]
    fn test_static_rules() {
        let (request, view, args) = fixture();
        let ctx = RuleContext::new(None, &request, &view, &args);

        assert_eq!(Rule::allow().evaluate(&ctx), RuleOutcome::Allowed);
        assert_eq!(Rule::deny().evaluate(&ctx), RuleOutcome::Denied);
        assert_eq!(Rule::from(true).describe(), "allow");
    }

    #[test]
    fn test_dynamic_rule_sees_context() {
        let (request, view, args) = fixture();
        let rule = Rule::when("is_get", |ctx| Ok(ctx.request().method() == "GET"));
        let ctx = RuleContext::new(None, &request, &view, &args);

        assert!(rule.evaluate(&ctx).is_allowed());
        assert_eq!(rule.describe(), "is_get");
    }

    #[test]
    fn test_principal_matches_arg() {
        let (request, view, args) = fixture();
        let rule = Rule::principal_matches_arg("user_id");

        let owner = Principal::new("42");
        let other = Principal::new("7");

        let ctx = RuleContext::new(Some(&owner), &request, &view, &args);
        assert!(rule.evaluate(&ctx).is_allowed());

        let ctx = RuleContext::new(Some(&other), &request, &view, &args);
        assert_eq!(rule.evaluate(&ctx), RuleOutcome::Denied);

        // 匿名请求
        let ctx = RuleContext::new(None, &request, &view, &args);
        assert_eq!(rule.evaluate(&ctx), RuleOutcome::Denied);
    }

    #[test]
    fn test_missing_argument_is_evaluation_failure() {
        let (request, view, _) = fixture();
        let empty = ViewArgs::new();
        let rule = Rule::principal_matches_arg("user_id");
        let principal = Principal::new("42");
        let ctx = RuleContext::new(Some(&principal), &request, &view, &empty);

        let outcome = rule.evaluate(&ctx);
        assert!(outcome.is_failed());
    }

    #[test]
    fn test_outcome_from_result() {
        assert_eq!(RuleOutcome::from(Ok(true)), RuleOutcome::Allowed);
        assert_eq!(RuleOutcome::from(Ok(false)), RuleOutcome::Denied);
        assert!(RuleOutcome::from(Err(PredicateError::new("x"))).is_failed());
    }
}
