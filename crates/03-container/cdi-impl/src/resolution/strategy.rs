//! 匹配策略
//!
//! 四类组件共用一个解析引擎，差别只在匹配谓词与结果排序。

use super::assignability::AssignabilityRules;
use super::resolvable::Resolvable;
use crate::manager::enablement::ModuleEnablement;
use cdi_common::{contains_all_qualifiers, BeanIdentifier, TypeStore};
use cdi_spi::{Bean, Decorator, InterceptionType, Interceptor, ObserverMethod};
use std::collections::HashSet;
use std::sync::Arc;

/// 候选项的只读视图
pub enum CandidateView<'a> {
    /// 组件
    Bean(&'a dyn Bean),
    /// 观察者方法
    Observer(&'a dyn ObserverMethod),
    /// 拦截器
    Interceptor(&'a dyn Interceptor),
    /// 装饰器
    Decorator(&'a dyn Decorator),
}

/// 可参与解析的候选项
pub trait Candidate: Clone + Send + Sync + 'static {
    /// 匹配所需的组件视图
    fn view(&self) -> CandidateView<'_>;

    /// 去重所用的标识
    fn candidate_id(&self) -> &BeanIdentifier;
}

impl Candidate for Arc<dyn Bean> {
    fn view(&self) -> CandidateView<'_> {
        CandidateView::Bean(self.as_ref())
    }

    fn candidate_id(&self) -> &BeanIdentifier {
        self.id()
    }
}

impl Candidate for Arc<dyn ObserverMethod> {
    fn view(&self) -> CandidateView<'_> {
        CandidateView::Observer(self.as_ref())
    }

    fn candidate_id(&self) -> &BeanIdentifier {
        self.id()
    }
}

impl Candidate for Arc<dyn Interceptor> {
    fn view(&self) -> CandidateView<'_> {
        CandidateView::Interceptor(self.as_ref())
    }

    fn candidate_id(&self) -> &BeanIdentifier {
        self.id()
    }
}

impl Candidate for Arc<dyn Decorator> {
    fn view(&self) -> CandidateView<'_> {
        CandidateView::Decorator(self.as_ref())
    }

    fn candidate_id(&self) -> &BeanIdentifier {
        self.id()
    }
}

/// 匹配时可用的环境
pub struct MatchContext<'a> {
    /// 类型仓库
    pub types: &'a TypeStore,
    /// 模块启用配置
    pub enablement: &'a ModuleEnablement,
    /// 已被启用的特化组件取代的组件
    pub specialized: &'a HashSet<BeanIdentifier>,
}

/// 匹配策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStrategy {
    /// 组件解析
    Bean,
    /// 观察者解析
    Observer,
    /// 按拦截类型解析拦截器
    Interceptor(InterceptionType),
    /// 装饰器解析
    Decorator,
}

impl MatchStrategy {
    /// 候选项是否匹配解析请求
    pub fn matches(&self, ctx: &MatchContext<'_>, resolvable: &Resolvable, candidate: CandidateView<'_>) -> bool {
        match (self, candidate) {
            (Self::Bean, CandidateView::Bean(bean)) => {
                let rules = if resolvable.is_delegate() {
                    AssignabilityRules::Delegate
                } else {
                    AssignabilityRules::Bean
                };
                ctx.enablement.is_bean_enabled(bean)
                    && rules.matches_any(ctx.types, resolvable.required_type(), bean.types())
                    && contains_all_qualifiers(resolvable.qualifiers(), bean.qualifiers())
            }
            (Self::Observer, CandidateView::Observer(observer)) => {
                resolvable
                    .types()
                    .iter()
                    .any(|ty| AssignabilityRules::Event.matches(ctx.types, observer.observed_type(), ty))
                    && contains_all_qualifiers(observer.observed_qualifiers(), resolvable.qualifiers())
            }
            (Self::Interceptor(kind), CandidateView::Interceptor(interceptor)) => {
                interceptor.intercepts(*kind)
                    && ctx.enablement.is_interceptor_enabled(interceptor.as_bean())
                    && !interceptor.interceptor_bindings().is_empty()
                    && contains_all_qualifiers(interceptor.interceptor_bindings(), resolvable.qualifiers())
            }
            (Self::Decorator, CandidateView::Decorator(decorator)) => {
                ctx.enablement.is_decorator_enabled(decorator.as_bean())
                    && AssignabilityRules::Delegate.matches_any(ctx.types, decorator.delegate_type(), resolvable.types())
                    && contains_all_qualifiers(decorator.delegate_qualifiers(), resolvable.qualifiers())
            }
            _ => false,
        }
    }

    /// 匹配后的收尾：去掉被特化的组件，按优先级或启用顺序稳定排序
    pub fn finish<T: Candidate>(&self, ctx: &MatchContext<'_>, matched: &mut Vec<T>) {
        match self {
            Self::Bean => matched.retain(|c| !ctx.specialized.contains(c.candidate_id())),
            Self::Observer => matched.sort_by_key(|c| match c.view() {
                CandidateView::Observer(observer) => observer.priority(),
                _ => 0,
            }),
            Self::Interceptor(_) => matched.sort_by_key(|c| match c.view() {
                CandidateView::Interceptor(i) => Some(ctx.enablement.interceptor_order(i.as_bean())),
                _ => None,
            }),
            Self::Decorator => matched.sort_by_key(|c| match c.view() {
                CandidateView::Decorator(d) => Some(ctx.enablement.decorator_order(d.as_bean())),
                _ => None,
            }),
        }
    }
}
