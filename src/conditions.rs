//! Condition profiles: analysis prompts and dietary recommendations.
//!
//! Every supported condition is a [`Condition`] variant mapped to one static
//! [`ConditionProfile`]. The profile carries the condition-specific focus that
//! is appended to the shared analysis prompt, plus the recommendation shown
//! next to the chart. Nothing here is mutable; the table is built at compile
//! time.
//!
//! Free-form names only enter through [`Condition::from_name`] (CLI parsing,
//! JSON requests) and [`recommendation_for`], which is total and falls back
//! to [`NO_RECOMMENDATION`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Shared prompt sent for every condition. The example block pins the
/// `Label - NN%` line format that [`crate::composition::extract`] parses.
pub const BASE_ANALYSIS_PROMPT: &str = r#"Diet Composition Analyzer

Analyze the diet composition based on the provided document or image.
Please identify the types of food and their composition.

Format for Reporting:

- Report each food category on its own line as: Category - NN%
- Use a plain hyphen surrounded by spaces between the category and the percentage.
- Percentages should describe the share of the overall diet and add up to roughly 100%.
- After the list, provide short insights into the overall diet balance and nutritional value.

Example:

Protein-rich foods - 40%
Carbohydrates - 30%
Vegetables - 20%
Fruits - 10%"#;

/// Returned by [`recommendation_for`] for names outside the closed set.
pub const NO_RECOMMENDATION: &str =
    "No specific recommendation is available for this condition.";

/// The closed set of supported dietary conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    #[default]
    General,
    Diabetes,
    Hypertension,
    HighCholesterol,
    GlutenIntolerance,
    Vegetarian,
    FoodAllergies,
    LowCarb,
    Athletes,
    Pregnancy,
    HeartDisease,
    Gastrointestinal,
    RenalDisease,
}

impl Condition {
    /// All conditions in display order.
    pub const ALL: [Condition; 13] = [
        Condition::General,
        Condition::Diabetes,
        Condition::Hypertension,
        Condition::HighCholesterol,
        Condition::GlutenIntolerance,
        Condition::Vegetarian,
        Condition::FoodAllergies,
        Condition::LowCarb,
        Condition::Athletes,
        Condition::Pregnancy,
        Condition::HeartDisease,
        Condition::Gastrointestinal,
        Condition::RenalDisease,
    ];

    /// The static profile for this condition.
    pub fn profile(self) -> &'static ConditionProfile {
        // PROFILES is declared in the same order as the enum.
        &PROFILES[self as usize]
    }

    /// Human-readable name, e.g. "Gluten Intolerance/Celiac".
    pub fn name(self) -> &'static str {
        self.profile().name
    }

    /// Short machine identifier, e.g. `gluten-intolerance`.
    pub fn slug(self) -> &'static str {
        match self {
            Condition::General => "general",
            Condition::Diabetes => "diabetes",
            Condition::Hypertension => "hypertension",
            Condition::HighCholesterol => "high-cholesterol",
            Condition::GlutenIntolerance => "gluten-intolerance",
            Condition::Vegetarian => "vegetarian",
            Condition::FoodAllergies => "food-allergies",
            Condition::LowCarb => "low-carb",
            Condition::Athletes => "athletes",
            Condition::Pregnancy => "pregnancy",
            Condition::HeartDisease => "heart-disease",
            Condition::Gastrointestinal => "gastrointestinal",
            Condition::RenalDisease => "renal-disease",
        }
    }

    /// Resolve a user-supplied name. Case, spacing and punctuation are
    /// ignored, and common aliases (`celiac`, `keto`, `vegan`, `kidney`, …)
    /// are accepted.
    pub fn from_name(name: &str) -> Option<Condition> {
        let key: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();

        let condition = match key.as_str() {
            "general" | "none" | "default" => Condition::General,
            "diabetes" | "diabetic" => Condition::Diabetes,
            "hypertension" | "highbloodpressure" => Condition::Hypertension,
            "highcholesterol" | "cholesterol" => Condition::HighCholesterol,
            "glutenintolerance" | "glutenintoleranceceliac" | "celiac" | "coeliac"
            | "glutenfree" => Condition::GlutenIntolerance,
            "vegetarian" | "vegan" | "vegetarianvegan" => Condition::Vegetarian,
            "foodallergies" | "allergies" | "allergy" => Condition::FoodAllergies,
            "lowcarb" | "keto" | "ketogenic" | "lowcarbketogenic" => Condition::LowCarb,
            "athletes" | "athlete" | "active" | "athletesactive" => Condition::Athletes,
            "pregnancy" | "lactation" | "pregnancylactation" => Condition::Pregnancy,
            "heartdisease" | "cardiac" => Condition::HeartDisease,
            "gastrointestinal" | "gastrointestinaldisorders" | "gi" => Condition::Gastrointestinal,
            "renaldisease" | "renal" | "kidney" | "kidneydisease" => Condition::RenalDisease,
            _ => return None,
        };
        Some(condition)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static prompt and recommendation text for one condition.
#[derive(Debug, PartialEq, Eq)]
pub struct ConditionProfile {
    pub condition: Condition,
    pub name: &'static str,
    /// Condition-specific instructions appended to [`BASE_ANALYSIS_PROMPT`].
    pub focus: &'static str,
    pub recommendation: &'static str,
}

impl ConditionProfile {
    /// Full prompt sent to the VLM for this condition.
    pub fn analysis_prompt(&self) -> String {
        if self.focus.is_empty() {
            BASE_ANALYSIS_PROMPT.to_string()
        } else {
            format!(
                "{BASE_ANALYSIS_PROMPT}\n\nCondition: {}\n{}",
                self.name, self.focus
            )
        }
    }
}

/// Total recommendation lookup by free-form condition name.
pub fn recommendation_for(name: &str) -> &'static str {
    Condition::from_name(name)
        .map(|c| c.profile().recommendation)
        .unwrap_or(NO_RECOMMENDATION)
}

static PROFILES: [ConditionProfile; 13] = [
    ConditionProfile {
        condition: Condition::General,
        name: "General",
        focus: "",
        recommendation: "Aim for a balanced plate: roughly half vegetables and fruits, a quarter \
whole grains and a quarter lean protein. Limit added sugars, refined grains and highly \
processed foods, and drink water as your main beverage.",
    },
    ConditionProfile {
        condition: Condition::Diabetes,
        name: "Diabetes",
        focus: "Pay particular attention to refined carbohydrates, added sugars and sweetened \
drinks, and report them as separate categories when present.",
        recommendation: "Favour low-glycaemic carbohydrates (whole grains, legumes, non-starchy \
vegetables) and spread them evenly across meals. Pair carbohydrates with protein or fibre, \
avoid sugar-sweetened beverages, and keep portion sizes consistent to stabilise blood glucose.",
    },
    ConditionProfile {
        condition: Condition::Hypertension,
        name: "Hypertension",
        focus: "Pay particular attention to salty, cured and processed foods, and report them \
as a separate category when present.",
        recommendation: "Follow a DASH-style pattern: plenty of vegetables, fruits and low-fat \
dairy, with sodium kept below 1,500–2,300 mg per day. Limit processed meats, canned soups and \
salty snacks, and favour potassium-rich foods such as bananas, beans and leafy greens.",
    },
    ConditionProfile {
        condition: Condition::HighCholesterol,
        name: "High Cholesterol",
        focus: "Distinguish saturated-fat sources (fatty meat, butter, full-fat dairy) from \
unsaturated-fat sources (oily fish, nuts, olive oil) in the categories you report.",
        recommendation: "Replace saturated and trans fats with unsaturated fats from olive oil, \
nuts and oily fish. Increase soluble fibre (oats, barley, beans, apples) and limit fatty cuts \
of meat, full-fat dairy and fried foods.",
    },
    ConditionProfile {
        condition: Condition::GlutenIntolerance,
        name: "Gluten Intolerance/Celiac",
        focus: "Report gluten-containing grains (wheat, barley, rye) as a separate category \
from naturally gluten-free grains.",
        recommendation: "Eliminate wheat, barley, rye and their derivatives entirely. Build \
meals around naturally gluten-free grains (rice, quinoa, buckwheat, certified oats), and check \
labels for hidden gluten in sauces, soups and processed foods.",
    },
    ConditionProfile {
        condition: Condition::Vegetarian,
        name: "Vegetarian/Vegan",
        focus: "Identify the plant and animal protein sources separately.",
        recommendation: "Combine legumes, soy, whole grains, nuts and seeds to cover protein \
needs. Watch vitamin B12, iron, zinc, calcium, iodine and omega-3 intake; B12 supplementation \
is recommended for vegans.",
    },
    ConditionProfile {
        condition: Condition::FoodAllergies,
        name: "Food Allergies",
        focus: "Report common allergen groups (nuts, dairy, eggs, shellfish, soy, wheat) as \
their own categories when present.",
        recommendation: "Strictly avoid identified allergens and read every ingredient label, \
including for cross-contamination warnings. Replace excluded food groups with equivalent \
nutrient sources and keep prescribed emergency medication at hand.",
    },
    ConditionProfile {
        condition: Condition::LowCarb,
        name: "Low Carb/Ketogenic",
        focus: "Separate starchy carbohydrates and sugars from non-starchy vegetables and \
report fat sources as their own category.",
        recommendation: "Keep net carbohydrates low by replacing grains, sugars and starchy \
vegetables with non-starchy vegetables, quality proteins and healthy fats. Stay hydrated and \
mind electrolytes (sodium, potassium, magnesium), especially in the first weeks.",
    },
    ConditionProfile {
        condition: Condition::Athletes,
        name: "Athletes/Active",
        focus: "Report protein and carbohydrate sources separately and note any recovery \
foods or supplements.",
        recommendation: "Match carbohydrate intake to training load and aim for 1.2–2.0 g of \
protein per kg of body weight, spread across the day. Refuel within a couple of hours after \
training and keep up fluid and electrolyte intake.",
    },
    ConditionProfile {
        condition: Condition::Pregnancy,
        name: "Pregnancy/Lactation",
        focus: "Note foods that supply folate, iron, calcium and omega-3 fats, and flag \
high-mercury fish, raw or undercooked foods, and alcohol.",
        recommendation: "Prioritise folate, iron, calcium, iodine and DHA from leafy greens, \
lean meat, dairy and low-mercury fish. Avoid alcohol, raw or undercooked animal products, \
unpasteurised dairy and high-mercury fish, and follow prenatal supplement advice.",
    },
    ConditionProfile {
        condition: Condition::HeartDisease,
        name: "Heart Disease",
        focus: "Identify processed meats, fried foods, and sources of saturated fat and salt \
as their own categories.",
        recommendation: "Follow a Mediterranean-style pattern rich in vegetables, fruits, whole \
grains, legumes, nuts and oily fish. Limit salt, saturated fat, processed meats and sugary \
foods, and use olive oil as the main cooking fat.",
    },
    ConditionProfile {
        condition: Condition::Gastrointestinal,
        name: "Gastrointestinal Disorders",
        focus: "Report high-fibre foods, dairy, spicy and fried foods as separate categories.",
        recommendation: "Eat smaller, regular meals and identify personal trigger foods; a \
low-FODMAP approach under professional guidance can help with IBS. Adjust fibre gradually, \
limit fried and very spicy food, and stay well hydrated.",
    },
    ConditionProfile {
        condition: Condition::RenalDisease,
        name: "Renal Disease",
        focus: "Report protein sources, dairy, and salty or processed foods separately, and \
note high-potassium foods.",
        recommendation: "Moderate protein to the level set by your care team and limit sodium, \
potassium and phosphorus (processed foods, colas, dairy, bananas, potatoes). Monitor fluid \
intake as advised and prefer fresh over processed foods.",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_line_up_with_variants() {
        for c in Condition::ALL {
            assert_eq!(c.profile().condition, c, "profile table out of order at {c:?}");
            assert!(!c.profile().recommendation.is_empty());
        }
    }

    #[test]
    fn every_prompt_carries_the_line_format() {
        for c in Condition::ALL {
            let prompt = c.profile().analysis_prompt();
            assert!(prompt.contains("Protein-rich foods - 40%"), "{c:?}");
        }
        assert_eq!(
            Condition::General.profile().analysis_prompt(),
            BASE_ANALYSIS_PROMPT
        );
        assert!(Condition::Diabetes
            .profile()
            .analysis_prompt()
            .contains("Condition: Diabetes"));
    }

    #[test]
    fn names_round_trip_through_from_name() {
        for c in Condition::ALL {
            assert_eq!(Condition::from_name(c.name()), Some(c), "{}", c.name());
            assert_eq!(Condition::from_name(c.slug()), Some(c), "{}", c.slug());
        }
    }

    #[test]
    fn from_name_accepts_aliases() {
        assert_eq!(Condition::from_name("Celiac"), Some(Condition::GlutenIntolerance));
        assert_eq!(Condition::from_name("  KETO "), Some(Condition::LowCarb));
        assert_eq!(Condition::from_name("vegan"), Some(Condition::Vegetarian));
        assert_eq!(Condition::from_name("kidney disease"), Some(Condition::RenalDisease));
        assert_eq!(Condition::from_name("gout"), None);
    }

    #[test]
    fn recommendation_lookup_is_total() {
        assert_eq!(
            recommendation_for("Diabetes"),
            Condition::Diabetes.profile().recommendation
        );
        assert_eq!(recommendation_for("unknown condition"), NO_RECOMMENDATION);
        assert_eq!(recommendation_for(""), NO_RECOMMENDATION);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&Condition::HighCholesterol).unwrap();
        assert_eq!(json, "\"high_cholesterol\"");
    }
}
