//! 类型可赋值规则
//!
//! 组件、事件与委托注入点使用不同的规则判断一个类型是否匹配请求类型。
//! 类型实参默认不变；通配符与类型变量按上下界协变匹配。

use cdi_common::{Type, TypeStore};
use std::collections::HashSet;

/// 可赋值规则
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignabilityRules {
    /// 注入点类型与组件类型
    Bean,
    /// 观察的事件类型与事件类型
    Event,
    /// 委托注入点类型与被装饰组件类型
    Delegate,
}

impl AssignabilityRules {
    /// 候选类型集合中至少有一个类型匹配请求类型
    pub fn matches_any(&self, store: &TypeStore, required: &Type, candidates: &HashSet<Type>) -> bool {
        candidates.iter().any(|candidate| self.matches(store, required, candidate))
    }

    /// 候选类型能否赋给所需类型
    pub fn matches(&self, store: &TypeStore, required: &Type, candidate: &Type) -> bool {
        match self {
            Self::Bean => bean_matches(store, required, candidate, false),
            Self::Delegate => bean_matches(store, required, candidate, true),
            Self::Event => event_matches(store, required, candidate),
        }
    }
}

fn bean_matches(store: &TypeStore, required: &Type, bean_type: &Type, delegate: bool) -> bool {
    match (required, bean_type) {
        (Type::Array { component: r }, Type::Array { component: b }) => bean_matches(store, r, b, delegate),
        (Type::Class { name: r }, Type::Class { name: b }) => r == b,
        (Type::Class { name: r }, Type::Parameterized { raw: b, args }) => {
            r == b && args.iter().all(Type::is_unbounded_variable_or_object)
        }
        (Type::Parameterized { raw: r, args }, Type::Class { name: b }) => {
            r == b && args.iter().all(Type::is_unbounded_variable_or_object)
        }
        (Type::Parameterized { raw: r, args: rargs }, Type::Parameterized { raw: b, args: bargs }) => {
            r == b
                && rargs.len() == bargs.len()
                && rargs
                    .iter()
                    .zip(bargs)
                    .all(|(ra, ba)| bean_parameter_matches(store, ra, ba, delegate))
        }
        _ => false,
    }
}

fn bean_parameter_matches(store: &TypeStore, required: &Type, bean: &Type, delegate: bool) -> bool {
    match (required, bean) {
        // 两个实际类型：原始类型相同，参数化时递归比较
        (r, b) if r.is_actual() && b.is_actual() => bean_matches(store, r, b, delegate),
        // 通配符与实际类型：实际类型落在通配符上下界之间
        (Type::Wildcard { upper, lower }, b) if b.is_actual() => {
            upper.iter().all(|u| is_assignable_from(store, u, b)) && lower.iter().all(|l| is_assignable_from(store, b, l))
        }
        // 通配符与类型变量：变量上界与通配符上界可互相赋值，且可由通配符下界赋值
        (Type::Wildcard { upper, lower }, Type::Variable { bounds, .. }) => {
            let bounds = effective_bounds(bounds);
            let upper = effective_bounds(upper);
            let upper_ok = bounds.iter().all(|vb| {
                upper
                    .iter()
                    .all(|wu| is_assignable_from(store, wu, vb) || is_assignable_from(store, vb, wu))
            });
            let lower_ok = lower
                .iter()
                .all(|l| bounds.iter().all(|vb| is_assignable_from(store, vb, l)));
            upper_ok && lower_ok
        }
        // 实际类型与类型变量：实际类型可赋值给变量上界
        (r, Type::Variable { bounds, .. }) if r.is_actual() => {
            effective_bounds(bounds).iter().all(|b| is_assignable_from(store, b, r))
        }
        // 两个类型变量：请求变量的上界可赋值给组件变量的上界
        (Type::Variable { bounds: rb, .. }, Type::Variable { bounds: bb, .. }) => {
            let rb = effective_bounds(rb);
            effective_bounds(bb)
                .iter()
                .all(|b| rb.iter().any(|r| is_assignable_from(store, b, r)))
        }
        // 委托注入点的类型变量与实际类型：实际类型可赋值给变量上界
        (Type::Variable { bounds, .. }, b) if delegate && b.is_actual() => {
            effective_bounds(bounds).iter().all(|bound| is_assignable_from(store, bound, b))
        }
        _ => false,
    }
}

fn event_matches(store: &TypeStore, observed: &Type, event_type: &Type) -> bool {
    match (observed, event_type) {
        (Type::Array { component: o }, Type::Array { component: e }) => event_matches(store, o, e),
        (Type::Class { name: o }, Type::Class { name: e }) => o == e,
        // 原始类型的观察者接收全部参数化形式
        (Type::Class { name: o }, Type::Parameterized { raw: e, .. }) => o == e,
        (Type::Parameterized { raw: o, args }, Type::Class { name: e }) => {
            o == e && args.iter().all(Type::is_unbounded_variable_or_object)
        }
        (Type::Parameterized { raw: o, args: oargs }, Type::Parameterized { raw: e, args: eargs }) => {
            o == e
                && oargs.len() == eargs.len()
                && oargs
                    .iter()
                    .zip(eargs)
                    .all(|(oa, ea)| event_parameter_matches(store, oa, ea))
        }
        (Type::Variable { bounds, .. }, e) => effective_bounds(bounds).iter().all(|b| is_assignable_from(store, b, e)),
        _ => false,
    }
}

fn event_parameter_matches(store: &TypeStore, observed: &Type, event: &Type) -> bool {
    match observed {
        o if o.is_actual() => event.is_actual() && event_matches(store, o, event),
        Type::Wildcard { upper, lower } => {
            upper.iter().all(|u| is_assignable_from(store, u, event))
                && lower.iter().all(|l| is_assignable_from(store, event, l))
        }
        Type::Variable { bounds, .. } => effective_bounds(bounds).iter().all(|b| is_assignable_from(store, b, event)),
        _ => false,
    }
}

fn effective_bounds(bounds: &[Type]) -> Vec<Type> {
    if bounds.is_empty() {
        vec![Type::object()]
    } else {
        bounds.to_vec()
    }
}

/// `from` 类型的值能否赋给 `to` 类型
pub fn is_assignable_from(store: &TypeStore, to: &Type, from: &Type) -> bool {
    if to.is_object() || to == from {
        return true;
    }
    match from {
        Type::Variable { bounds, .. } | Type::Wildcard { upper: bounds, .. } => {
            effective_bounds(bounds).iter().any(|b| b != from && is_assignable_from(store, to, b))
        }
        Type::Array { component } => match to {
            Type::Array { component: to_component } => is_assignable_from(store, to_component, component),
            _ => false,
        },
        Type::Class { name } | Type::Parameterized { raw: name, .. } => match to {
            Type::Class { name: to_name } => store.is_subclass(name, to_name),
            Type::Parameterized { raw, args } => match store.find_supertype(from, raw) {
                Some(Type::Parameterized { args: from_args, .. }) => {
                    args.len() == from_args.len()
                        && args
                            .iter()
                            .zip(from_args.iter())
                            .all(|(to_arg, from_arg)| type_argument_contains(store, to_arg, from_arg))
                }
                // 原始类型到参数化类型的非受检转换
                Some(_) => true,
                None => false,
            },
            Type::Variable { bounds, .. } => effective_bounds(bounds).iter().all(|b| is_assignable_from(store, b, from)),
            Type::Wildcard { upper, lower } => {
                upper.iter().all(|u| is_assignable_from(store, u, from))
                    && lower.iter().all(|l| is_assignable_from(store, from, l))
            }
            Type::Array { .. } => false,
        },
    }
}

fn type_argument_contains(store: &TypeStore, to_arg: &Type, from_arg: &Type) -> bool {
    match to_arg {
        Type::Wildcard { upper, lower } => {
            upper.iter().all(|u| is_assignable_from(store, u, from_arg))
                && lower.iter().all(|l| is_assignable_from(store, from_arg, l))
        }
        Type::Variable { name, bounds } => match from_arg {
            Type::Variable { name: from_name, .. } if from_name == name => true,
            _ => effective_bounds(bounds).iter().all(|b| is_assignable_from(store, b, from_arg)),
        },
        _ => to_arg == from_arg,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdi_common::ClassDefinition;

    fn store() -> TypeStore {
        let store = TypeStore::new();
        store.register(ClassDefinition::new("Number"));
        store.register(ClassDefinition::new("Integer").extends(Type::class("Number")));
        store.register(ClassDefinition::new("String"));
        store.register(ClassDefinition::interface("List").with_type_parameter("E"));
        store
    }

    fn list(arg: Type) -> Type {
        Type::parameterized("List", vec![arg])
    }

    #[test]
    fn test_bean_rules_are_invariant_for_actual_types() {
        let store = store();
        let rules = AssignabilityRules::Bean;
        assert!(rules.matches(&store, &list(Type::class("Integer")), &list(Type::class("Integer"))));
        assert!(!rules.matches(&store, &list(Type::class("Number")), &list(Type::class("Integer"))));
        assert!(!rules.matches(&store, &Type::class("Number"), &Type::class("Integer")));
    }

    #[test]
    fn test_bean_rules_wildcards_and_variables() {
        let store = store();
        let rules = AssignabilityRules::Bean;
        let extends_number = list(Type::wildcard_extends(Type::class("Number")));
        assert!(rules.matches(&store, &extends_number, &list(Type::class("Integer"))));
        assert!(!rules.matches(&store, &extends_number, &list(Type::class("String"))));

        let super_integer = list(Type::wildcard_super(Type::class("Integer")));
        assert!(rules.matches(&store, &super_integer, &list(Type::class("Number"))));
        assert!(!rules.matches(&store, &super_integer, &list(Type::class("String"))));

        let bounded_var = list(Type::bounded_variable("T", vec![Type::class("Number")]));
        assert!(rules.matches(&store, &list(Type::class("Integer")), &bounded_var));
        assert!(!rules.matches(&store, &list(Type::class("String")), &bounded_var));
    }

    #[test]
    fn test_raw_and_parameterized() {
        let store = store();
        let rules = AssignabilityRules::Bean;
        assert!(rules.matches(&store, &Type::class("List"), &list(Type::object())));
        assert!(rules.matches(&store, &Type::class("List"), &list(Type::variable("E"))));
        assert!(!rules.matches(&store, &Type::class("List"), &list(Type::class("String"))));
        assert!(rules.matches(&store, &list(Type::object()), &Type::class("List")));
    }

    #[test]
    fn test_delegate_variable_matches_actual() {
        let store = store();
        let required = list(Type::bounded_variable("T", vec![Type::class("Number")]));
        assert!(AssignabilityRules::Delegate.matches(&store, &required, &list(Type::class("Integer"))));
        assert!(!AssignabilityRules::Bean.matches(&store, &required, &list(Type::class("Integer"))));
    }

    #[test]
    fn test_event_rules() {
        let store = store();
        let rules = AssignabilityRules::Event;
        assert!(rules.matches(&store, &Type::class("List"), &list(Type::class("String"))));
        assert!(rules.matches(&store, &list(Type::wildcard()), &list(Type::class("String"))));
        assert!(rules.matches(
            &store,
            &list(Type::wildcard_extends(Type::class("Number"))),
            &list(Type::class("Integer"))
        ));
        assert!(!rules.matches(&store, &list(Type::class("Number")), &list(Type::class("Integer"))));
        assert!(rules.matches(&store, &Type::variable("T"), &Type::class("String")));
    }

    #[test]
    fn test_is_assignable_from() {
        let store = store();
        assert!(is_assignable_from(&store, &Type::class("Number"), &Type::class("Integer")));
        assert!(!is_assignable_from(&store, &Type::class("Integer"), &Type::class("Number")));
        assert!(is_assignable_from(&store, &Type::object(), &Type::class("String")));
        assert!(is_assignable_from(
            &store,
            &Type::array(Type::class("Number")),
            &Type::array(Type::class("Integer"))
        ));
    }
}
