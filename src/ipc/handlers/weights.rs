use crate::calc;
use crate::ipc::error::ok;
use crate::ipc::helpers::{db_conn, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn categories_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::new("bad_params", "name must not be empty"));
    }
    let category_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO weight_categories(id, name) VALUES(?, ?)",
        (&category_id, &name),
    )
    .map_err(|e| HandlerErr {
        code: "db_insert_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "weight_categories" })),
    })?;
    Ok(json!({ "weightCategoryId": category_id, "name": name }))
}

fn categories_list(conn: &Connection) -> Result<serde_json::Value, HandlerErr> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM weight_categories ORDER BY name")
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let categories = stmt
        .query_map([], |r| {
            let id: String = r.get(0)?;
            let name: String = r.get(1)?;
            Ok(json!({ "id": id, "name": name }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    Ok(json!({ "weightCategories": categories }))
}

/// Full replacement of a class's weight table. The 100-percent invariant is
/// enforced here, before anything is written: an invalid distribution never
/// reaches the store.
fn weights_save(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    store::class_exists(conn, &class_id)?;

    let Some(raw) = params.get("weights").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::new("bad_params", "missing weights"));
    };

    let mut proposed: Vec<calc::WeightSetting> = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some(category_id) = entry.get("weightCategoryId").and_then(|v| v.as_str()) else {
            return Err(HandlerErr::new(
                "bad_params",
                "each weight needs weightCategoryId",
            ));
        };
        let Some(percent) = entry.get("weightPercent").and_then(|v| v.as_f64()) else {
            return Err(HandlerErr::new(
                "bad_params",
                "each weight needs numeric weightPercent",
            ));
        };
        if !(0.0..=100.0).contains(&percent) {
            return Err(HandlerErr {
                code: "bad_params",
                message: "weightPercent must be within 0..=100".to_string(),
                details: Some(json!({ "weightPercent": percent })),
            });
        }
        let name: Option<String> = conn
            .query_row(
                "SELECT name FROM weight_categories WHERE id = ?",
                [category_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
        let Some(name) = name else {
            return Err(HandlerErr {
                code: "not_found",
                message: "weight category not found".to_string(),
                details: Some(json!({ "weightCategoryId": category_id })),
            });
        };
        if proposed
            .iter()
            .any(|w| w.weight_category_id == category_id)
        {
            return Err(HandlerErr {
                code: "bad_params",
                message: "duplicate weightCategoryId".to_string(),
                details: Some(json!({ "weightCategoryId": category_id })),
            });
        }
        proposed.push(calc::WeightSetting {
            weight_category_id: category_id.to_string(),
            name,
            weight_percent: percent,
        });
    }

    calc::validate_weights(&proposed)?;

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;
    if let Err(e) = tx.execute(
        "DELETE FROM class_weight_settings WHERE class_id = ?",
        [&class_id],
    ) {
        let _ = tx.rollback();
        return Err(HandlerErr::new("db_delete_failed", e.to_string()));
    }
    for w in &proposed {
        if let Err(e) = tx.execute(
            "INSERT INTO class_weight_settings(class_id, weight_category_id, weight_percent)
             VALUES(?, ?, ?)",
            (&class_id, &w.weight_category_id, w.weight_percent),
        ) {
            let _ = tx.rollback();
            return Err(HandlerErr {
                code: "db_insert_failed",
                message: e.to_string(),
                details: Some(json!({ "table": "class_weight_settings" })),
            });
        }
    }
    tx.commit()
        .map_err(|e| HandlerErr::new("db_commit_failed", e.to_string()))?;

    Ok(json!({ "ok": true, "weightCount": proposed.len() }))
}

fn weights_get(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    store::class_exists(conn, &class_id)?;
    let settings = store::weight_settings(conn, &class_id)?;
    let sum: f64 = settings.iter().map(|s| s.weight_percent).sum();
    let weights = settings
        .iter()
        .map(|s| {
            json!({
                "weightCategoryId": s.weight_category_id,
                "name": s.name,
                "weightPercent": s.weight_percent
            })
        })
        .collect::<Vec<_>>();
    Ok(json!({
        "weights": weights,
        "weightSum": sum,
        "valid": calc::validate_weights(&settings).is_ok()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let run = |f: &dyn Fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerErr>| {
        let conn = match db_conn(state, &req.id) {
            Ok(v) => v,
            Err(e) => return e,
        };
        match f(conn, &req.params) {
            Ok(result) => ok(&req.id, result),
            Err(error) => error.response(&req.id),
        }
    };

    match req.method.as_str() {
        "weightCategories.create" => Some(run(&categories_create)),
        "weightCategories.list" => Some(run(&|conn, _| categories_list(conn))),
        "weights.save" => Some(run(&weights_save)),
        "weights.get" => Some(run(&weights_get)),
        _ => None,
    }
}
