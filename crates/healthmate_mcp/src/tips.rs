//! Built-in wellness-tip catalog used to seed tip generation.

use rand::{RngExt, rng};

#[derive(Clone, Copy, Debug)]
pub struct CatalogTip {
    pub title: &'static str,
    pub content: &'static str,
    pub category: &'static str,
}

pub const TIP_CATALOG: &[CatalogTip] = &[
    CatalogTip {
        title: "Stay Hydrated for Better Health",
        content: "Drinking adequate water helps maintain body temperature, lubricates joints, \
                  and supports organ function. Aim for 8-10 glasses (2-2.5 liters) daily, more \
                  if you're active or in hot weather.",
        category: "hydration",
    },
    CatalogTip {
        title: "The Power of Regular Exercise",
        content: "Just 30 minutes of moderate exercise daily can reduce risk of heart disease, \
                  strengthen bones, improve mental health, and boost energy levels. Find \
                  activities you enjoy to make it sustainable.",
        category: "fitness",
    },
    CatalogTip {
        title: "Quality Sleep for Optimal Health",
        content: "Adults need 7-9 hours of quality sleep nightly. Good sleep improves immune \
                  function, mental clarity, emotional stability, and physical recovery. \
                  Maintain consistent sleep schedules.",
        category: "sleep",
    },
    CatalogTip {
        title: "Mindful Eating Habits",
        content: "Eat slowly, chew thoroughly, and listen to hunger cues. Include colorful \
                  vegetables, lean proteins, whole grains, and healthy fats. Limit processed \
                  foods and added sugars.",
        category: "nutrition",
    },
    CatalogTip {
        title: "Stress Management Techniques",
        content: "Chronic stress affects physical and mental health. Practice deep breathing, \
                  meditation, yoga, or regular physical activity. Take breaks, connect with \
                  others, and prioritize self-care.",
        category: "mental_health",
    },
    CatalogTip {
        title: "The Importance of Regular Health Checkups",
        content: "Annual health screenings can detect problems early when they're most \
                  treatable. Monitor blood pressure, cholesterol, blood sugar, and maintain \
                  up-to-date vaccinations.",
        category: "prevention",
    },
];

pub fn random_catalog_tip() -> &'static CatalogTip {
    let mut rng = rng();
    &TIP_CATALOG[rng.random_range(0..TIP_CATALOG.len())]
}

/// Social-share blurb accompanying every tip reply.
pub fn share_text(title: &str, content: &str) -> String {
    format!("💡 Health Tip: {title}\n\n{content}\n\n#HealthTip #Wellness")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_known_categories() {
        let known = [
            "hydration",
            "fitness",
            "sleep",
            "nutrition",
            "mental_health",
            "prevention",
        ];
        for tip in TIP_CATALOG {
            assert!(known.contains(&tip.category), "unknown {}", tip.category);
        }
    }

    #[test]
    fn random_tip_comes_from_catalog() {
        let tip = random_catalog_tip();
        assert!(TIP_CATALOG.iter().any(|t| t.title == tip.title));
    }

    #[test]
    fn share_text_embeds_title_and_content() {
        let text = share_text("Move More", "Walk daily.");
        assert!(text.contains("Move More"));
        assert!(text.contains("Walk daily."));
        assert!(text.contains("#HealthTip"));
    }
}
