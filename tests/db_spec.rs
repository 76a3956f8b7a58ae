use speculate2::speculate;
use spy_cat_agency::db::Database;
use spy_cat_agency::lifecycle::LifecycleError;
use spy_cat_agency::models::*;
use uuid::Uuid;

fn create_test_cat(db: &Database, name: &str) -> Cat {
    db.create_cat(CreateCatInput {
        name: name.to_string(),
        years_of_experience: 4,
        breed: "Siamese".to_string(),
        salary: 1500.0,
    })
    .expect("Failed to create cat")
}

fn target_input(name: &str) -> CreateTargetInput {
    CreateTargetInput {
        name: name.to_string(),
        country: "Spain".to_string(),
        notes: String::new(),
    }
}

fn create_test_mission(db: &Database, target_count: usize) -> MissionWithTargets {
    db.create_mission(CreateMissionInput {
        targets: (0..target_count)
            .map(|i| target_input(&format!("Target {}", i)))
            .collect(),
    })
    .expect("Failed to create mission")
}

fn complete(db: &Database, target_id: Uuid) -> Target {
    db.update_target(
        target_id,
        UpdateTargetInput {
            notes: None,
            complete: Some(true),
        },
    )
    .expect("Failed to complete target")
}

fn rule_error<T: std::fmt::Debug>(result: anyhow::Result<T>) -> LifecycleError {
    result
        .expect_err("Expected a rule violation")
        .downcast::<LifecycleError>()
        .expect("Expected a LifecycleError")
}

fn row_counts(db: &Database) -> (usize, usize) {
    let missions = db
        .get_all_missions(&MissionFilter::default())
        .expect("Query failed");
    let targets = missions.iter().map(|m| m.targets.len()).sum();
    (missions.len(), targets)
}

speculate! {
    before {
        let db = Database::open_memory().expect("Failed to create in-memory database");
        db.migrate().expect("Failed to run migrations");
    }

    describe "cats" {
        describe "create_cat" {
            it "creates a cat with all fields" {
                let cat = create_test_cat(&db, "Whiskers");

                assert_eq!(cat.name, "Whiskers");
                assert_eq!(cat.years_of_experience, 4);
                assert_eq!(cat.breed, "Siamese");
                assert_eq!(cat.salary, 1500.0);
            }

            it "rejects a negative salary" {
                let result = db.create_cat(CreateCatInput {
                    name: "Greedy".to_string(),
                    years_of_experience: 1,
                    breed: "Bengal".to_string(),
                    salary: -10.0,
                });

                assert_eq!(rule_error(result), LifecycleError::InvalidSalary(-10.0));
                assert!(db.get_all_cats().expect("Query failed").is_empty());
            }
        }

        describe "get_cat" {
            it "returns None for non-existent cat" {
                let result = db.get_cat(Uuid::new_v4()).expect("Query failed");
                assert!(result.is_none());
            }

            it "returns the cat by id" {
                let created = create_test_cat(&db, "Shadow");
                let found = db.get_cat(created.id).expect("Query failed");
                assert_eq!(found, Some(created));
            }
        }

        describe "get_all_cats" {
            it "returns all cats ordered by name" {
                create_test_cat(&db, "Zorro");
                create_test_cat(&db, "Ace");

                let cats = db.get_all_cats().expect("Query failed");
                assert_eq!(cats.len(), 2);
                assert_eq!(cats[0].name, "Ace");
                assert_eq!(cats[1].name, "Zorro");
            }
        }

        describe "update_cat" {
            it "changes only the salary" {
                let cat = create_test_cat(&db, "Shadow");

                let updated = db
                    .update_cat(cat.id, UpdateCatInput { salary: 2200.0 })
                    .expect("Update failed")
                    .expect("Cat missing");

                assert_eq!(updated.salary, 2200.0);
                assert_eq!(updated.name, cat.name);
                assert_eq!(db.get_cat(cat.id).expect("Query failed"), Some(updated));
            }

            it "returns None for non-existent cat" {
                let result = db
                    .update_cat(Uuid::new_v4(), UpdateCatInput { salary: 1.0 })
                    .expect("Update failed");
                assert!(result.is_none());
            }
        }

        describe "delete_cat" {
            it "deletes an idle cat" {
                let cat = create_test_cat(&db, "Retiree");
                db.delete_cat(cat.id).expect("Delete failed");
                assert!(db.get_cat(cat.id).expect("Query failed").is_none());
            }

            it "reports missing cats" {
                assert_eq!(rule_error(db.delete_cat(Uuid::new_v4())), LifecycleError::CatNotFound);
            }

            it "refuses while the cat has an active mission" {
                let cat = create_test_cat(&db, "Busy");
                let mission = create_test_mission(&db, 1);
                db.assign_cat(mission.mission.id, cat.id).expect("Assign failed");

                assert_eq!(rule_error(db.delete_cat(cat.id)), LifecycleError::CatHasActiveMission);
                assert!(db.get_cat(cat.id).expect("Query failed").is_some());
            }

            it "succeeds once the mission is complete and keeps the mission" {
                let cat = create_test_cat(&db, "Veteran");
                let mission = create_test_mission(&db, 1);
                db.assign_cat(mission.mission.id, cat.id).expect("Assign failed");
                complete(&db, mission.targets[0].id);

                db.delete_cat(cat.id).expect("Delete failed");

                let kept = db
                    .get_mission(mission.mission.id)
                    .expect("Query failed")
                    .expect("Mission missing");
                assert!(kept.mission.complete);
                assert!(kept.mission.cat_id.is_none());
            }
        }
    }

    describe "missions" {
        describe "create_mission" {
            it "creates a mission with its targets" {
                let mission = create_test_mission(&db, 3);

                assert!(mission.mission.cat_id.is_none());
                assert!(!mission.mission.complete);
                assert_eq!(mission.targets.len(), 3);
                assert!(mission.targets.iter().all(|t| t.mission_id == mission.mission.id));
                assert!(mission.targets.iter().all(|t| !t.complete));
            }

            it "rejects zero targets without writing anything" {
                let result = db.create_mission(CreateMissionInput { targets: vec![] });

                assert_eq!(rule_error(result), LifecycleError::InvalidTargetCount(0));
                assert_eq!(row_counts(&db), (0, 0));
            }

            it "rejects four targets without writing anything" {
                let result = db.create_mission(CreateMissionInput {
                    targets: (0..4).map(|i| target_input(&format!("T{}", i))).collect(),
                });

                assert_eq!(rule_error(result), LifecycleError::InvalidTargetCount(4));
                assert_eq!(row_counts(&db), (0, 0));
            }
        }

        describe "get_all_missions" {
            it "filters by cat and completion" {
                let cat = create_test_cat(&db, "Filter");
                let assigned = create_test_mission(&db, 1);
                let open = create_test_mission(&db, 2);
                db.assign_cat(assigned.mission.id, cat.id).expect("Assign failed");
                complete(&db, assigned.targets[0].id);

                let by_cat = db
                    .get_all_missions(&MissionFilter { cat_id: Some(cat.id), complete: None })
                    .expect("Query failed");
                assert_eq!(by_cat.len(), 1);
                assert_eq!(by_cat[0].mission.id, assigned.mission.id);
                assert_eq!(by_cat[0].cat.as_ref().map(|c| c.id), Some(cat.id));

                let active = db
                    .get_all_missions(&MissionFilter { cat_id: None, complete: Some(false) })
                    .expect("Query failed");
                assert_eq!(active.len(), 1);
                assert_eq!(active[0].mission.id, open.mission.id);

                let done = db
                    .get_all_missions(&MissionFilter { cat_id: Some(cat.id), complete: Some(true) })
                    .expect("Query failed");
                assert_eq!(done.len(), 1);
            }
        }

        describe "assign_cat" {
            it "assigns an idle cat" {
                let cat = create_test_cat(&db, "Idle");
                let mission = create_test_mission(&db, 2);

                let assigned = db.assign_cat(mission.mission.id, cat.id).expect("Assign failed");

                assert_eq!(assigned.mission.cat_id, Some(cat.id));
                assert_eq!(assigned.cat, Some(cat));
                assert_eq!(assigned.targets.len(), 2);
            }

            it "reports missing mission and cat" {
                let cat = create_test_cat(&db, "Lost");
                let mission = create_test_mission(&db, 1);

                assert_eq!(
                    rule_error(db.assign_cat(Uuid::new_v4(), cat.id)),
                    LifecycleError::MissionNotFound
                );
                assert_eq!(
                    rule_error(db.assign_cat(mission.mission.id, Uuid::new_v4())),
                    LifecycleError::CatNotFound
                );
            }

            it "refuses a cat that already has an active mission" {
                let cat = create_test_cat(&db, "Busy");
                let first = create_test_mission(&db, 1);
                let second = create_test_mission(&db, 1);
                db.assign_cat(first.mission.id, cat.id).expect("Assign failed");

                assert_eq!(
                    rule_error(db.assign_cat(second.mission.id, cat.id)),
                    LifecycleError::CatAlreadyAssigned
                );
                let second = db.get_mission(second.mission.id).expect("Query failed").expect("Missing");
                assert!(second.mission.cat_id.is_none());
            }

            it "refuses a second cat for a mission that is already held" {
                let first = create_test_cat(&db, "First");
                let second = create_test_cat(&db, "Second");
                let mission = create_test_mission(&db, 1);
                db.assign_cat(mission.mission.id, first.id).expect("Assign failed");

                assert_eq!(
                    rule_error(db.assign_cat(mission.mission.id, second.id)),
                    LifecycleError::MissionAlreadyAssigned
                );
            }

            it "lets a cat take a new mission after finishing the previous one" {
                let cat = create_test_cat(&db, "Serial");
                let first = create_test_mission(&db, 1);
                let second = create_test_mission(&db, 1);
                db.assign_cat(first.mission.id, cat.id).expect("Assign failed");
                complete(&db, first.targets[0].id);

                db.assign_cat(second.mission.id, cat.id).expect("Second assign failed");

                let first = db.get_mission(first.mission.id).expect("Query failed").expect("Missing");
                assert_eq!(first.mission.cat_id, Some(cat.id));
            }
        }

        describe "unassign_cat" {
            it "clears the cat link" {
                let cat = create_test_cat(&db, "Quitter");
                let mission = create_test_mission(&db, 1);
                db.assign_cat(mission.mission.id, cat.id).expect("Assign failed");

                let unassigned = db.unassign_cat(mission.mission.id).expect("Unassign failed");

                assert!(unassigned.mission.cat_id.is_none());
                assert!(unassigned.cat.is_none());
                db.assign_cat(create_test_mission(&db, 1).mission.id, cat.id)
                    .expect("Cat should be free again");
            }

            it "refuses a mission without a cat" {
                let mission = create_test_mission(&db, 1);
                assert_eq!(
                    rule_error(db.unassign_cat(mission.mission.id)),
                    LifecycleError::MissionNotAssigned
                );
            }
        }

        describe "delete_mission" {
            it "deletes an unassigned mission and its targets" {
                let mission = create_test_mission(&db, 3);

                db.delete_mission(mission.mission.id).expect("Delete failed");

                assert!(db.get_mission(mission.mission.id).expect("Query failed").is_none());
                for target in &mission.targets {
                    assert!(db.get_target(target.id).expect("Query failed").is_none());
                }
            }

            it "refuses an assigned mission" {
                let cat = create_test_cat(&db, "Guard");
                let mission = create_test_mission(&db, 1);
                db.assign_cat(mission.mission.id, cat.id).expect("Assign failed");

                assert_eq!(
                    rule_error(db.delete_mission(mission.mission.id)),
                    LifecycleError::MissionAssignedToCat
                );
                assert_eq!(row_counts(&db), (1, 1));
            }

            it "succeeds after unassigning" {
                let cat = create_test_cat(&db, "Guard");
                let mission = create_test_mission(&db, 1);
                db.assign_cat(mission.mission.id, cat.id).expect("Assign failed");
                db.unassign_cat(mission.mission.id).expect("Unassign failed");

                db.delete_mission(mission.mission.id).expect("Delete failed");
                assert_eq!(row_counts(&db), (0, 0));
            }

            it "reports missing missions" {
                assert_eq!(
                    rule_error(db.delete_mission(Uuid::new_v4())),
                    LifecycleError::MissionNotFound
                );
            }
        }
    }

    describe "targets" {
        describe "update_target" {
            it "updates notes without touching completion" {
                let mission = create_test_mission(&db, 1);
                let target = &mission.targets[0];

                let updated = db
                    .update_target(target.id, UpdateTargetInput {
                        notes: Some("Drinks espresso at 7am".to_string()),
                        complete: None,
                    })
                    .expect("Update failed");

                assert_eq!(updated.notes, "Drinks espresso at 7am");
                assert!(!updated.complete);
                let stored = db.get_mission(mission.mission.id).expect("Query failed").expect("Missing");
                assert!(!stored.mission.complete);
            }

            it "completes the mission with its last target" {
                let mission = create_test_mission(&db, 2);

                complete(&db, mission.targets[0].id);
                let after_first = db.get_mission(mission.mission.id).expect("Query failed").expect("Missing");
                assert!(!after_first.mission.complete);

                complete(&db, mission.targets[1].id);
                let after_last = db.get_mission(mission.mission.id).expect("Query failed").expect("Missing");
                assert!(after_last.mission.complete);
                assert!(after_last.targets.iter().all(|t| t.complete));
            }

            it "freezes completed targets" {
                let mission = create_test_mission(&db, 2);
                complete(&db, mission.targets[0].id);

                let result = db.update_target(mission.targets[0].id, UpdateTargetInput {
                    notes: Some("too late".to_string()),
                    complete: None,
                });

                assert_eq!(rule_error(result), LifecycleError::TargetOrMissionComplete);
                let stored = db.get_target(mission.targets[0].id).expect("Query failed").expect("Missing");
                assert_eq!(stored.notes, "");
            }

            it "keeps a completed mission complete" {
                let mission = create_test_mission(&db, 1);
                complete(&db, mission.targets[0].id);

                let result = db.update_target(mission.targets[0].id, UpdateTargetInput {
                    notes: None,
                    complete: Some(false),
                });

                assert_eq!(rule_error(result), LifecycleError::TargetOrMissionComplete);
                let stored = db.get_mission(mission.mission.id).expect("Query failed").expect("Missing");
                assert!(stored.mission.complete);
                assert!(stored.targets[0].complete);
            }

            it "reports missing targets" {
                let result = db.update_target(Uuid::new_v4(), UpdateTargetInput::default());
                assert_eq!(rule_error(result), LifecycleError::TargetNotFound);
            }
        }
    }

    describe "concurrency" {
        it "lets only one of several racing assignments claim a cat" {
            let cat = create_test_cat(&db, "Contested");
            let mission_ids: Vec<Uuid> = (0..8)
                .map(|_| create_test_mission(&db, 1).mission.id)
                .collect();

            let handles: Vec<_> = mission_ids
                .into_iter()
                .map(|mission_id| {
                    let db = db.clone();
                    let cat_id = cat.id;
                    std::thread::spawn(move || db.assign_cat(mission_id, cat_id).map(|_| ()))
                })
                .collect();
            let results: Vec<_> = handles
                .into_iter()
                .map(|handle| handle.join().expect("Assign thread panicked"))
                .collect();

            assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
            for result in results.into_iter().filter(|r| r.is_err()) {
                assert_eq!(rule_error(result), LifecycleError::CatAlreadyAssigned);
            }

            let active = db
                .get_missions_by_cat(cat.id)
                .expect("Query failed")
                .into_iter()
                .filter(|m| m.mission.is_active())
                .count();
            assert_eq!(active, 1);
        }

        it "completes the mission when its last two targets finish together" {
            let mission = create_test_mission(&db, 3);
            complete(&db, mission.targets[0].id);

            let handles: Vec<_> = mission.targets[1..]
                .iter()
                .map(|target| {
                    let db = db.clone();
                    let target_id = target.id;
                    std::thread::spawn(move || {
                        db.update_target(
                            target_id,
                            UpdateTargetInput {
                                notes: None,
                                complete: Some(true),
                            },
                        )
                        .map(|_| ())
                    })
                })
                .collect();
            for handle in handles {
                handle
                    .join()
                    .expect("Update thread panicked")
                    .expect("Failed to complete target");
            }

            let reloaded = db
                .get_mission(mission.mission.id)
                .expect("Query failed")
                .expect("Mission missing");
            assert!(reloaded.mission.complete);
            assert!(reloaded.targets.iter().all(|t| t.complete));
        }
    }

    describe "persistence" {
        it "keeps data across reopening a database file" {
            let dir = tempfile::tempdir().expect("Failed to create temp dir");
            let path = dir.path().join("nested").join("cats.db");

            let cat_id = {
                let file_db = Database::open(path.clone()).expect("Failed to open");
                file_db.migrate().expect("Failed to migrate");
                create_test_cat(&file_db, "Durable").id
            };

            let reopened = Database::open(path).expect("Failed to reopen");
            reopened.migrate().expect("Failed to migrate");
            let cat = reopened.get_cat(cat_id).expect("Query failed").expect("Cat missing");
            assert_eq!(cat.name, "Durable");
        }
    }
}
