use serde_json::{json, Value};

use prodsearch_core::config::Settings;
use prodsearch_core::Result;
use prodsearch_embed::HashEmbedder;

use crate::index::MemoryIndex;

/// A small furniture catalog. Prices are in cents.
pub fn sample_catalog() -> Vec<Value> {
    vec![
        json!({
            "id": "prod_sofa_blue", "title": "Blue Velvet Sofa", "description": "Three seat sofa in deep blue velvet",
            "category_names": ["sofas"], "ai_colors": ["blue"], "ai_materials": ["velvet"], "ai_style": ["modern"],
            "tag_values": ["living room"], "default_price": 45000, "default_currency": "usd",
            "price_reg_eu": 42000, "currency_reg_eu": "eur", "image_labels": ["Couch", "Blue", "Furniture"]
        }),
        json!({
            "id": "prod_sofa_grey", "title": "Grey Linen Sofa", "description": "Compact two seat sofa",
            "category_names": ["sofas"], "ai_colors": ["grey"], "ai_materials": ["linen"], "ai_style": ["scandinavian"],
            "tag_values": ["living room"], "default_price": 38000, "default_currency": "usd",
            "image_labels": ["Couch", "Gray", "Furniture"]
        }),
        json!({
            "id": "prod_chair_red", "title": "Red Accent Chair", "description": "Armchair with oak legs",
            "category_names": ["chairs"], "ai_colors": ["red"], "ai_materials": ["fabric", "oak"],
            "ai_style": ["mid-century"],
            "tag_values": ["living room"], "default_price": 19000, "default_currency": "usd",
            "image_labels": ["Chair", "Red", "Furniture"]
        }),
        json!({
            "id": "prod_lamp_brass", "title": "Brass Floor Lamp", "description": "Tall reading lamp with linen shade",
            "category_names": ["lighting"], "ai_colors": ["gold"], "ai_materials": ["brass"], "ai_style": ["vintage"],
            "tag_values": ["reading"], "default_price": 8900, "default_currency": "usd",
            "image_labels": ["Lamp", "Gold"]
        }),
        json!({
            "id": "prod_table_oak", "title": "Oak Dining Table", "description": "Solid oak table for six",
            "category_names": ["tables"], "ai_colors": ["brown"], "ai_materials": ["oak"], "ai_style": ["rustic"],
            "tag_values": ["dining room"], "default_price": 120000, "default_currency": "usd",
            "image_labels": ["Table", "Wood", "Furniture"]
        }),
        json!({
            "id": "prod_rug_navy", "title": "Navy Wool Rug", "description": "Hand woven blue rug",
            "category_names": ["rugs"], "ai_colors": ["blue", "navy"], "ai_materials": ["wool"],
            "ai_style": ["traditional"],
            "tag_values": ["living room"], "default_price": 26000, "default_currency": "usd",
            "image_labels": ["Rug", "Blue"]
        }),
    ]
}

/// [`sample_catalog`] indexed with the configured vector fields.
pub fn sample_index(settings: &Settings) -> Result<MemoryIndex> {
    MemoryIndex::from_catalog(sample_catalog(), &HashEmbedder::new(settings.embedding.dimension), &settings.index)
}
