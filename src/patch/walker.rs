//! 分发树遍历
//!
//! 对类的每个视图方法，沿 MRO 从最派生的类开始查找，第一个自身定义该方法的类
//! 就是插入点。共享祖先方法对所有子类产生同一个插入点。

use crate::config::GuardConfig;
use crate::view::{ClassRef, ViewClass};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// 插入点：（定义方法的类，方法名）
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InsertionPoint {
    /// 定义方法的类
    pub class: ClassRef,
    /// 方法名
    pub method: String,
}

impl fmt::Display for InsertionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class.name, self.method)
    }
}

/// 类的视图方法名：分发约定中的名称加上 MRO 中标记的额外动作
pub fn view_method_names(class: &ViewClass, config: &GuardConfig) -> BTreeSet<String> {
    let mut names: BTreeSet<String> = config.view_methods.iter().cloned().collect();
    for ancestor in class.mro() {
        names.extend(
            ancestor
                .own_methods()
                .filter(|m| m.is_action())
                .map(|m| m.name().to_string()),
        );
    }
    names
}

/// 定义方法的类（MRO 中第一个自身定义该方法的类）
pub fn owner_of<'a>(class: &'a ViewClass, method: &str) -> Option<&'a ViewClass> {
    class.mro().into_iter().find(|c| c.defines(method))
}

/// 计算类的全部插入点
pub fn resolve_insertion_points(class: &ViewClass, config: &GuardConfig) -> BTreeSet<InsertionPoint> {
    view_method_names(class, config)
        .into_iter()
        .filter_map(|method| {
            owner_of(class, &method).map(|owner| InsertionPoint {
                class: owner.class_ref(),
                method,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Response;
    use std::sync::Arc;

    fn hierarchy() -> (Arc<ViewClass>, Arc<ViewClass>, Arc<ViewClass>) {
        let base = ViewClass::builder("app.views", "BaseView")
            .method("get", |_| Ok(Response::ok("base get")))
            .method("post", |_| Ok(Response::ok("base post")))
            .method("helper", |_| Ok(Response::ok("helper")))
            .build()
            .unwrap();
        let left = ViewClass::builder("app.views", "LeftView")
            .base(&base)
            .method("post", |_| Ok(Response::ok("left post")))
            .build()
            .unwrap();
        let right = ViewClass::builder("app.views", "RightView")
            .base(&base)
            .action("export", |_| Ok(Response::ok("export")))
            .build()
            .unwrap();
        (base, left, right)
    }

    #[test]
    fn test_owner_of_walks_mro() {
        let (base, left, right) = hierarchy();
        assert_eq!(owner_of(&left, "get").unwrap().id(), base.id());
        assert_eq!(owner_of(&left, "post").unwrap().id(), left.id());
        assert_eq!(owner_of(&right, "export").unwrap().id(), right.id());
        assert!(owner_of(&right, "delete").is_none());
    }

    #[test]
    fn test_shared_ancestor_yields_same_point() {
        let (base, left, right) = hierarchy();
        let config = GuardConfig::default();

        let left_points = resolve_insertion_points(&left, &config);
        let right_points = resolve_insertion_points(&right, &config);

        let shared = InsertionPoint {
            class: base.class_ref(),
            method: "get".to_string(),
        };
        assert!(left_points.contains(&shared));
        assert!(right_points.contains(&shared));

        let methods: Vec<_> = right_points.iter().map(|p| p.to_string()).collect();
        assert_eq!(methods, vec!["BaseView.get", "BaseView.post", "RightView.export"]);

        // 非视图方法不是插入点
        assert!(!left_points.iter().any(|p| p.method == "helper"));
    }

    #[test]
    fn test_custom_dispatch_convention() {
        let (_, left, _) = hierarchy();
        let config = GuardConfig::default().view_methods(["post"]);
        let points = resolve_insertion_points(&left, &config);
        assert_eq!(points.len(), 1);
        assert_eq!(points.iter().next().unwrap().class.name, "LeftView");
    }
}
