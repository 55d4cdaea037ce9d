//! 特化
//!
//! 启用的特化组件取代它直接继承的组件，被取代的组件不再参与解析。

use super::enablement::ModuleEnablement;
use cdi_common::{BeanIdentifier, ClassName, DefinitionError, TypeStore};
use cdi_spi::Bean;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 被启用的特化组件取代的组件
pub fn specialized_beans(beans: &[Arc<dyn Bean>], enablement: &ModuleEnablement) -> HashSet<BeanIdentifier> {
    let specialized_classes: HashSet<&ClassName> = beans
        .iter()
        .filter(|bean| enablement.is_bean_enabled(bean.as_ref()))
        .filter_map(|bean| bean.specialized_class())
        .collect();
    if specialized_classes.is_empty() {
        return HashSet::new();
    }
    beans
        .iter()
        .filter(|bean| specialized_classes.contains(bean.bean_class()))
        .map(|bean| bean.id().clone())
        .collect()
}

/// 检查特化定义的一致性
///
/// 特化组件必须直接继承被特化的类，被特化的类必须有组件，同一个类最多被一个启用的组件特化。
pub fn check_specialization(
    beans: &[Arc<dyn Bean>],
    enablement: &ModuleEnablement,
    types: &TypeStore,
) -> Vec<DefinitionError> {
    let mut errors = Vec::new();
    let mut specializing: HashMap<&ClassName, Vec<&BeanIdentifier>> = HashMap::new();

    for bean in beans {
        let Some(specialized) = bean.specialized_class() else {
            continue;
        };
        if types.direct_superclass(bean.bean_class()).as_ref() != Some(specialized) {
            errors.push(DefinitionError::InconsistentSpecialization {
                bean: bean.id().to_string(),
                message: format!("没有直接继承 {}", specialized),
            });
            continue;
        }
        if !beans.iter().any(|other| other.bean_class() == specialized) {
            errors.push(DefinitionError::InconsistentSpecialization {
                bean: bean.id().to_string(),
                message: format!("被特化的类 {} 没有对应的组件", specialized),
            });
            continue;
        }
        if enablement.is_bean_enabled(bean.as_ref()) {
            specializing.entry(specialized).or_default().push(bean.id());
        }
    }

    for (specialized, ids) in specializing {
        if ids.len() > 1 {
            let mut names: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
            names.sort();
            errors.push(DefinitionError::InconsistentSpecialization {
                bean: specialized.to_string(),
                message: format!("被多个组件特化: {}", names.join(", ")),
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::SyntheticBean;
    use cdi_common::{ClassDefinition, Type};

    struct Fixture {
        types: TypeStore,
        beans: Vec<Arc<dyn Bean>>,
    }

    fn fixture() -> Fixture {
        let types = TypeStore::new();
        types.register(ClassDefinition::new("PaymentService"));
        types.register(ClassDefinition::new("MockPaymentService").extends(Type::class("PaymentService")));
        types.register(ClassDefinition::new("AuditedMock").extends(Type::class("MockPaymentService")));
        let base: Arc<dyn Bean> = SyntheticBean::builder("app", "PaymentService").build();
        let mock: Arc<dyn Bean> = SyntheticBean::builder("app", "MockPaymentService")
            .specializes("PaymentService")
            .build();
        Fixture {
            types,
            beans: vec![base, mock],
        }
    }

    #[test]
    fn test_specialized_bean_is_replaced() {
        let fixture = fixture();
        let specialized = specialized_beans(&fixture.beans, &ModuleEnablement::new());
        assert_eq!(specialized.len(), 1);
        assert!(specialized.contains(fixture.beans[0].id()));
        assert!(check_specialization(&fixture.beans, &ModuleEnablement::new(), &fixture.types).is_empty());
    }

    #[test]
    fn test_disabled_alternative_does_not_specialize() {
        let fixture = fixture();
        let disabled: Arc<dyn Bean> = SyntheticBean::builder("app", "MockPaymentService")
            .identifier("disabled-mock")
            .alternative()
            .specializes("PaymentService")
            .build();
        let beans = vec![fixture.beans[0].clone(), disabled];
        assert!(specialized_beans(&beans, &ModuleEnablement::new()).is_empty());
    }

    #[test]
    fn test_inconsistent_specialization() {
        let fixture = fixture();
        let indirect: Arc<dyn Bean> = SyntheticBean::builder("app", "AuditedMock")
            .specializes("PaymentService")
            .build();
        let duplicate: Arc<dyn Bean> = SyntheticBean::builder("app", "MockPaymentService")
            .identifier("second-mock")
            .specializes("PaymentService")
            .build();
        let mut beans = fixture.beans.clone();
        beans.push(indirect);
        beans.push(duplicate);
        let errors = check_specialization(&beans, &ModuleEnablement::new(), &fixture.types);
        assert_eq!(errors.len(), 2);
        assert!(errors
            .iter()
            .all(|e| matches!(e, DefinitionError::InconsistentSpecialization { .. })));
    }
}
