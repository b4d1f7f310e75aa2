use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use trackbert_domain::ports::TrackingProvider;
use trackbert_domain::value_objects::{CarrierPattern, CarrierSupport};

/// 一条承运商注册记录
#[derive(Clone)]
pub struct ProviderRegistration {
    pub pattern: CarrierPattern,
    pub priority: i32,
    pub display_name: Option<String>,
    pub provider: Arc<dyn TrackingProvider>,
}

impl std::fmt::Debug for ProviderRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistration")
            .field("pattern", &self.pattern)
            .field("priority", &self.priority)
            .field("display_name", &self.display_name)
            .field("provider", &self.provider.name())
            .finish()
    }
}

/// 承运商到追踪服务的映射，启动后只读
///
/// 同一承运商有多个注册时取优先级最高者，优先级相同时先注册者胜出。
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    registrations: Vec<ProviderRegistration>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 依次枚举各追踪服务支持的承运商
    ///
    /// 某个服务枚举失败时只是不贡献任何注册，不影响启动。
    pub async fn from_providers(providers: Vec<Arc<dyn TrackingProvider>>) -> Self {
        let mut registry = Self::new();

        for provider in providers {
            match provider.supported_carriers().await {
                Ok(carriers) => {
                    debug!(
                        "追踪服务 {} 声明了 {} 个承运商",
                        provider.name(),
                        carriers.len()
                    );
                    for support in carriers {
                        registry.register(support, Arc::clone(&provider));
                    }
                }
                Err(e) => {
                    warn!("追踪服务 {} 枚举承运商失败，已忽略: {}", provider.name(), e);
                }
            }
        }

        info!("承运商注册完成，共 {} 条", registry.len());
        registry
    }

    pub fn register(&mut self, support: CarrierSupport, provider: Arc<dyn TrackingProvider>) {
        self.registrations.push(ProviderRegistration {
            pattern: support.pattern,
            priority: support.priority,
            display_name: support.display_name,
            provider,
        });
    }

    /// 返回匹配该承运商且优先级最高的注册
    pub fn resolve_registration(&self, carrier: &str) -> Option<&ProviderRegistration> {
        let mut best: Option<&ProviderRegistration> = None;
        for registration in self
            .registrations
            .iter()
            .filter(|r| r.pattern.matches(carrier))
        {
            match best {
                Some(current) if registration.priority <= current.priority => {}
                _ => best = Some(registration),
            }
        }
        best
    }

    pub fn resolve(&self, carrier: &str) -> Option<Arc<dyn TrackingProvider>> {
        self.resolve_registration(carrier)
            .map(|registration| Arc::clone(&registration.provider))
    }

    /// 每个承运商代码取优先级最高的注册，按代码排序
    ///
    /// 返回 (承运商代码, 显示名称, 追踪服务名称)。
    pub fn carrier_table(&self) -> Vec<(String, Option<String>, String)> {
        let mut table: BTreeMap<String, &ProviderRegistration> = BTreeMap::new();
        for registration in &self.registrations {
            let code = registration.pattern.to_string();
            match table.get(&code) {
                Some(current) if registration.priority <= current.priority => {}
                _ => {
                    table.insert(code, registration);
                }
            }
        }

        table
            .into_iter()
            .map(|(code, registration)| {
                (
                    code,
                    registration.display_name.clone(),
                    registration.provider.name().to_string(),
                )
            })
            .collect()
    }

    pub fn registrations(&self) -> &[ProviderRegistration] {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackbert_testing_utils::MockProvider;

    fn provider(name: &str) -> Arc<dyn TrackingProvider> {
        Arc::new(MockProvider::new(name))
    }

    #[test]
    fn test_resolve_picks_highest_priority() {
        let mut registry = ProviderRegistry::new();
        registry.register(CarrierSupport::new("dhl", 1), provider("A"));
        registry.register(CarrierSupport::new("dhl", 5), provider("B"));
        registry.register(CarrierSupport::new("*", 0), provider("C"));

        assert_eq!(registry.resolve("dhl").unwrap().name(), "B");
        assert_eq!(registry.resolve("ups").unwrap().name(), "C");
    }

    #[test]
    fn test_wildcard_can_outrank_exact_match() {
        let mut registry = ProviderRegistry::new();
        registry.register(CarrierSupport::new("dhl", 1), provider("A"));
        registry.register(CarrierSupport::new("*", 10), provider("C"));

        assert_eq!(registry.resolve("dhl").unwrap().name(), "C");
    }

    #[test]
    fn test_equal_priority_first_registered_wins() {
        let mut registry = ProviderRegistry::new();
        registry.register(CarrierSupport::new("dhl", 3), provider("first"));
        registry.register(CarrierSupport::new("dhl", 3), provider("second"));
        registry.register(CarrierSupport::new("*", 3), provider("third"));

        assert_eq!(registry.resolve("dhl").unwrap().name(), "first");
    }

    #[test]
    fn test_resolve_miss_returns_none() {
        let mut registry = ProviderRegistry::new();
        registry.register(CarrierSupport::new("dhl", 1), provider("A"));

        assert!(registry.resolve("ups").is_none());
        assert!(ProviderRegistry::new().resolve("dhl").is_none());
    }

    #[tokio::test]
    async fn test_failing_provider_contributes_nothing() {
        let providers: Vec<Arc<dyn TrackingProvider>> = vec![
            Arc::new(MockProvider::new("broken").failing_carriers()),
            Arc::new(MockProvider::new("ok").supporting("dhl", 2).supporting("ups", 1)),
        ];

        let registry = ProviderRegistry::from_providers(providers).await;

        assert_eq!(registry.len(), 2);
        assert!(registry
            .registrations()
            .iter()
            .all(|r| r.provider.name() == "ok"));
    }

    #[test]
    fn test_carrier_table_keeps_best_registration_per_code() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            CarrierSupport::new("dhl", 1).with_display_name("DHL Express"),
            provider("A"),
        );
        registry.register(
            CarrierSupport::new("dhl", 5).with_display_name("DHL Paket"),
            provider("B"),
        );
        registry.register(CarrierSupport::new("austrian_post", 1), provider("A"));

        let table = registry.carrier_table();
        assert_eq!(
            table,
            vec![
                ("austrian_post".to_string(), None, "A".to_string()),
                ("dhl".to_string(), Some("DHL Paket".to_string()), "B".to_string()),
            ]
        );
    }
}
