//! 管理器图
//!
//! 管理器之间的可访问关系是有向图，可能有环。管理器按编号存放在部署级的 arena 中，
//! 图遍历使用显式的访问集合。

use super::node::ManagerNode;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 管理器编号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(usize);

impl ManagerId {
    /// 在注册表中的位置
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ManagerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manager#{}", self.0)
    }
}

/// 部署内全部管理器
///
/// 管理器只增不删，编号一经分配始终有效。
#[derive(Default)]
pub struct ManagerArena {
    nodes: RwLock<Vec<Arc<ManagerNode>>>,
}

impl ManagerArena {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配编号并加入管理器
    pub fn insert(&self, make: impl FnOnce(ManagerId) -> ManagerNode) -> Arc<ManagerNode> {
        let mut nodes = self.nodes.write();
        let node = Arc::new(make(ManagerId(nodes.len())));
        nodes.push(node.clone());
        node
    }

    /// 按标识取节点
    pub fn get(&self, id: ManagerId) -> Option<Arc<ManagerNode>> {
        self.nodes.read().get(id.0).cloned()
    }

    /// 全部节点，按注册顺序
    pub fn all(&self) -> Vec<Arc<ManagerNode>> {
        self.nodes.read().clone()
    }

    /// 数量
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// 从 `start` 出发可达的管理器，包含自身，按深度优先的访问顺序
    pub fn reachable_from(&self, start: ManagerId) -> Vec<Arc<ManagerNode>> {
        let nodes = self.nodes.read();
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(node) = nodes.get(id.0) else {
                continue;
            };
            order.push(node.clone());
            // 逆序入栈以保持声明顺序
            for next in node.accessible().into_iter().rev() {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }
        order
    }

    /// 能到达 `target` 的管理器，包含自身
    pub fn reaching(&self, target: ManagerId) -> Vec<Arc<ManagerNode>> {
        let all = self.all();
        let mut reaching = HashSet::from([target]);
        // 反向边上的不动点迭代
        loop {
            let before = reaching.len();
            for node in &all {
                if !reaching.contains(&node.id()) && node.accessible().iter().any(|id| reaching.contains(id)) {
                    reaching.insert(node.id());
                }
            }
            if reaching.len() == before {
                break;
            }
        }
        all.into_iter().filter(|node| reaching.contains(&node.id())).collect()
    }
}
