use serde::Serialize;
use serde_json::{json, Value};

use backend_kit::db::ids::IntIds;
use backend_kit::db::page::{Order, PageOption, PageQuery};
use backend_kit::pool::{business_handle, WorkerPool};
use backend_kit::utils::diff::DiffBox;
use backend_kit::utils::tree::{tree, TreeOption, TreeRow};
use backend_kit::CoreError;

#[derive(Debug, Clone, Serialize)]
struct Dept {
    id: i64,
    pid: i64,
    name: String,
    path: String,
    #[serde(rename = "isHide")]
    is_hide: bool,
}

impl TreeRow for Dept {
    fn id(&self) -> i64 {
        self.id
    }
    fn pid(&self) -> i64 {
        self.pid
    }
    fn is_hide(&self) -> bool {
        self.is_hide
    }
    fn path(&self) -> &str {
        &self.path
    }
}

fn dept(id: i64, pid: i64, path: &str, hide: bool) -> Dept {
    Dept {
        id,
        pid,
        name: format!("部门{}", id),
        path: path.to_string(),
        is_hide: hide,
    }
}

#[test]
fn test_tree_with_hidden_branch() {
    // 3 隐藏，其下级 4 也不应出现
    let rows = vec![
        dept(4, 3, "1,3,4", false),
        dept(1, 0, "1", false),
        dept(2, 1, "1,2", false),
        dept(3, 1, "1,3", true),
    ];
    let nodes = tree(&rows, &TreeOption::default().enable(true)).unwrap();
    assert_eq!(nodes.len(), 1);
    assert_eq!(nodes[0]["id"], 1);
    assert_eq!(nodes[0]["childCount"], 1);
    assert_eq!(nodes[0]["children"][0]["id"], 2);
    assert_eq!(nodes[0]["children"][0]["hasChild"], false);

    let all = tree(&rows, &TreeOption::default()).unwrap();
    assert_eq!(all[0]["childCount"], 2);
    assert_eq!(all[0]["totalCount"].as_f64(), Some(4.0));
}

#[derive(Debug, Clone, Serialize)]
struct Account {
    name: String,
    status: i32,
}

#[test]
fn test_diff_box_reports_changes() {
    let mut diff = DiffBox::new(Account {
        name: "张三".to_string(),
        status: 1,
    });
    diff.set_new_and_compare(Account {
        name: "张三".to_string(),
        status: 2,
    })
    .unwrap();
    assert!(diff.is_change("status").unwrap());
    assert!(!diff.is_change("name").unwrap());
    assert!(diff.result_content().contains("status"));
}

#[test]
fn test_page_query_order_priority() {
    let query: PageQuery = serde_json::from_value(json!({
        "page": 2,
        "size": 20,
        "sortField": "created_at",
    }))
    .unwrap();
    assert_eq!(query.limit().offset(), 20);

    let option = PageOption::new(query).default_order(Order::desc("sort"));
    assert_eq!(option.build_order_string().unwrap(), "\"created_at\" desc");

    let bad: PageQuery = serde_json::from_value(json!({"sortField": "id;drop table"})).unwrap();
    assert!(PageOption::new(bad).build_order_string().is_err());
}

#[tokio::test]
async fn test_pool_processes_comma_ids() {
    let ids: IntIds = "1,2,3,4,5".parse().unwrap();

    let mut pool = WorkerPool::new(2, 2);
    pool.run();
    for id in ids.into_inner() {
        pool.submit(move |_ctx| async move {
            business_handle(id, |id| {
                if id % 2 == 0 {
                    Err(CoreError::business("偶数不处理"))
                } else {
                    Ok(Some(id * 100))
                }
            })
        })
        .await
        .unwrap();
    }

    let results = pool.close_and_wait().await;
    assert_eq!(results.len(), 5);

    let mut done: Vec<i64> = results
        .iter()
        .filter(|r| r.is_success())
        .filter_map(|r| r.data.as_i64())
        .collect();
    done.sort();
    assert_eq!(done, vec![100, 300, 500]);

    let failed: Vec<&Value> = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| &r.data)
        .collect();
    assert_eq!(failed.len(), 2);
}
