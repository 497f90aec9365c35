//! 守卫表
//!
//! 按稳定标识记录已安装的插入点、已包装的可调用对象以及视图描述。
//! 安装时写入，请求时只读。

use crate::patch::walker::InsertionPoint;
use crate::patch::{read, write};
use crate::rbac::RoleRules;
use crate::view::{CallableId, CallableMeta, ClassId, ClassRef};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

/// 视图的查找键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HandlerKey {
    /// 函数视图
    Function(CallableId),
    /// （具体类，视图方法）
    Method {
        /// 具体类
        class: ClassId,
        /// 方法名
        method: String,
    },
}

impl HandlerKey {
    /// 类视图方法的键
    pub fn method(class: ClassId, method: &str) -> Self {
        HandlerKey::Method {
            class,
            method: method.to_string(),
        }
    }
}

/// 视图种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    /// 函数视图
    Function,
    /// 类视图方法
    Method,
}

/// 视图描述
///
/// 由安装过程创建，之后不会被移除
#[derive(Debug, Clone)]
pub struct HandlerDescriptor {
    /// 种类
    pub kind: HandlerKind,
    /// 具体类（仅类视图方法）
    pub owning_class: Option<ClassRef>,
    /// 方法名（仅类视图方法）
    pub method_name: Option<String>,
    /// 对外元数据
    pub callable: CallableMeta,
    /// 可调用对象标识（函数视图）
    pub callable_id: Option<CallableId>,
    /// 守卫所在的插入点（仅类视图方法）
    pub insertion_point: Option<InsertionPoint>,
    /// 是否已安装守卫
    pub is_patched: bool,
    /// 合并后的声明权限
    pub declared_permissions: Option<Arc<RoleRules>>,
}

#[derive(Debug, Default)]
struct TableState {
    insertion_points: BTreeMap<ClassId, BTreeSet<String>>,
    points: BTreeSet<InsertionPoint>,
    wrapped: BTreeSet<CallableId>,
    descriptors: BTreeMap<HandlerKey, HandlerDescriptor>,
}

/// 守卫表
#[derive(Debug, Default)]
pub struct GuardTable {
    state: RwLock<TableState>,
}

impl GuardTable {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入点是否已安装
    pub fn has_insertion_point(&self, class: ClassId, method: &str) -> bool {
        read(&self.state)
            .insertion_points
            .get(&class)
            .is_some_and(|methods| methods.contains(method))
    }

    /// 安装插入点，已存在时返回 `false`
    pub fn install_insertion_point(&self, point: &InsertionPoint) -> bool {
        let mut state = write(&self.state);
        let newly = state
            .insertion_points
            .entry(point.class.id)
            .or_default()
            .insert(point.method.clone());
        if newly {
            state.points.insert(point.clone());
        }
        newly
    }

    /// 已安装的插入点
    pub fn insertion_points(&self) -> Vec<InsertionPoint> {
        read(&self.state).points.iter().cloned().collect()
    }

    /// 可调用对象是否已被包装
    pub fn is_wrapped(&self, id: CallableId) -> bool {
        read(&self.state).wrapped.contains(&id)
    }

    /// 记录已包装的可调用对象，已存在时返回 `false`
    pub fn mark_wrapped(&self, id: CallableId) -> bool {
        write(&self.state).wrapped.insert(id)
    }

    /// 记录视图描述；同一个键只记录一次
    pub fn record(&self, key: HandlerKey, descriptor: HandlerDescriptor) -> bool {
        let mut state = write(&self.state);
        if state.descriptors.contains_key(&key) {
            return false;
        }
        state.descriptors.insert(key, descriptor);
        true
    }

    /// 查找视图描述
    pub fn descriptor(&self, key: &HandlerKey) -> Option<HandlerDescriptor> {
        read(&self.state).descriptors.get(key).cloned()
    }

    /// 视图的声明权限
    pub fn declared(&self, key: &HandlerKey) -> Option<Arc<RoleRules>> {
        read(&self.state)
            .descriptors
            .get(key)
            .and_then(|d| d.declared_permissions.clone())
    }

    /// 全部视图描述
    pub fn descriptors(&self) -> Vec<HandlerDescriptor> {
        read(&self.state).descriptors.values().cloned().collect()
    }

    /// 描述数量
    pub fn len(&self) -> usize {
        read(&self.state).descriptors.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
