use std::{
    collections::HashMap,
    str::FromStr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use futures::TryStreamExt;
use graphmirror::{
    core::repository::WeakRepository,
    error::{DeserializationError, FillError, StorageError},
    field,
    memory::MemoryDocumentStore,
    relationship::{ManyToManyRelationship, OneToManyRelationship, OneToOneRelationship},
    storage::{CollectionHandle, DocumentCollection, DocumentStore, DocumentStream},
    Document, Entity, EntityEventListener, EntityId, EntitySerializer, PersistenceLayer, PrimaryKey, QueueConfig, RecordCodec,
    Repository, RepositoryFiller, TaskQueue, ToMany, ToOne,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Level;

// Initialize tracing for tests
#[ctor::ctor]
fn init_tracing() {
    // if LOG_LEVEL env var is set, use it
    if let Ok(level) = std::env::var("LOG_LEVEL") {
        tracing_subscriber::fmt().with_max_level(Level::from_str(&level).unwrap()).with_test_writer().init();
    } else {
        tracing_subscriber::fmt().with_max_level(Level::INFO).with_test_writer().init();
    }
}

pub struct Person {
    pub name: String,
    pub age: Option<u32>,
    pub favourite_color: Option<String>,
    pub best_friend: ToOne<Person>,
    pub friends: ToMany<Person>,
    pub attended_trips: ToMany<Trip>,
    pub organized_trips: ToMany<Trip>,
}

impl Person {
    pub fn new(people: &Repository<Person>, trips: &Repository<Trip>, name: &str) -> Self {
        Self {
            name: name.to_owned(),
            age: None,
            favourite_color: None,
            best_friend: ToOne::empty(people),
            friends: ToMany::empty(people),
            attended_trips: ToMany::empty(trips),
            organized_trips: ToMany::empty(trips),
        }
    }
}

pub struct Trip {
    pub location: String,
    pub participants: ToMany<Person>,
    pub organizer: ToOne<Person>,
}

impl Trip {
    pub fn new(people: &Repository<Person>, location: &str) -> Self {
        Self { location: location.to_owned(), participants: ToMany::empty(people), organizer: ToOne::empty(people) }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRecord {
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favourite_color: Option<String>,
    #[serde(default)]
    pub best_friend: Option<EntityId>,
    #[serde(default)]
    pub friends: Vec<EntityId>,
    #[serde(default)]
    pub attended_trips: Vec<EntityId>,
    #[serde(default)]
    pub organized_trips: Vec<EntityId>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: EntityId,
    pub location: String,
    #[serde(default)]
    pub participants: Vec<EntityId>,
    #[serde(default)]
    pub organizer: Option<EntityId>,
}

/// Pointers are rebuilt against the repositories the codec was created with
pub struct PersonCodec {
    people: WeakRepository<Person>,
    trips: WeakRepository<Trip>,
}

pub struct TripCodec {
    people: WeakRepository<Person>,
}

fn upgrade<T>(repository: &WeakRepository<T>) -> Result<Repository<T>, DeserializationError> {
    repository.upgrade().ok_or_else(|| DeserializationError::Other("repository dropped".into()))
}

impl RecordCodec<Person> for PersonCodec {
    type Record = PersonRecord;

    fn to_record(&self, id: &EntityId, person: &Person) -> PersonRecord {
        PersonRecord {
            id: id.clone(),
            name: person.name.clone(),
            age: person.age,
            favourite_color: person.favourite_color.clone(),
            best_friend: person.best_friend.id().cloned(),
            friends: person.friends.ids().to_vec(),
            attended_trips: person.attended_trips.ids().to_vec(),
            organized_trips: person.organized_trips.ids().to_vec(),
        }
    }

    fn from_record(&self, record: PersonRecord) -> Result<(EntityId, Person), DeserializationError> {
        let (people, trips) = (upgrade(&self.people)?, upgrade(&self.trips)?);
        let person = Person {
            name: record.name,
            age: record.age,
            favourite_color: record.favourite_color,
            best_friend: ToOne::new(&people, record.best_friend),
            friends: ToMany::new(&people, record.friends),
            attended_trips: ToMany::new(&trips, record.attended_trips),
            organized_trips: ToMany::new(&trips, record.organized_trips),
        };
        Ok((record.id, person))
    }
}

impl RecordCodec<Trip> for TripCodec {
    type Record = TripRecord;

    fn to_record(&self, id: &EntityId, trip: &Trip) -> TripRecord {
        TripRecord {
            id: id.clone(),
            location: trip.location.clone(),
            participants: trip.participants.ids().to_vec(),
            organizer: trip.organizer.id().cloned(),
        }
    }

    fn from_record(&self, record: TripRecord) -> Result<(EntityId, Trip), DeserializationError> {
        let people = upgrade(&self.people)?;
        let trip = Trip {
            location: record.location,
            participants: ToMany::new(&people, record.participants),
            organizer: ToOne::new(&people, record.organizer),
        };
        Ok((record.id, trip))
    }
}

pub fn best_friends() -> OneToOneRelationship<Person, Person> {
    OneToOneRelationship::new(field!(Person, best_friend), field!(Person, best_friend))
}

pub fn friendship() -> ManyToManyRelationship<Person, Person> { ManyToManyRelationship::new(field!(Person, friends), field!(Person, friends)) }

pub fn attendance() -> ManyToManyRelationship<Person, Trip> {
    ManyToManyRelationship::new(field!(Person, attended_trips), field!(Trip, participants))
}

pub fn organizing() -> OneToManyRelationship<Person, Trip> {
    OneToManyRelationship::new(field!(Person, organized_trips), field!(Trip, organizer))
}

/// A store write that reached the underlying collection
#[derive(Debug, Clone, PartialEq)]
pub struct Write {
    pub collection: String,
    pub kind: &'static str,
    pub key: String,
    pub document: Option<Value>,
}

/// Completed writes across every collection, in completion order
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Write>>>);

impl Journal {
    fn record(&self, write: Write) { self.0.lock().unwrap().push(write); }

    pub fn writes(&self) -> Vec<Write> { self.0.lock().unwrap().clone() }

    /// `"{collection} {kind} {key}"` per write
    pub fn summary(&self) -> Vec<String> {
        self.writes().iter().map(|w| format!("{} {} {}", w.collection, w.kind, w.key)).collect()
    }
}

#[allow(unused)]
pub enum Fault {
    Delay(Duration),
    Fail,
    Panic,
}

/// Wraps a collection to journal completed writes and to inject one-shot faults per key.
pub struct FaultyCollection {
    inner: Arc<dyn DocumentCollection>,
    journal: Journal,
    faults: Mutex<HashMap<String, Fault>>,
}

impl FaultyCollection {
    pub fn new(inner: Arc<dyn DocumentCollection>, journal: Journal) -> Self { Self { inner, journal, faults: Mutex::new(HashMap::new()) } }

    /// The next write touching `key` gets `fault`
    pub fn inject(&self, key: &str, fault: Fault) { self.faults.lock().unwrap().insert(key.to_owned(), fault); }

    async fn apply_fault(&self, key: &str) -> Result<(), StorageError> {
        let fault = self.faults.lock().unwrap().remove(key);
        match fault {
            Some(Fault::Delay(delay)) => tokio::time::sleep(delay).await,
            Some(Fault::Fail) => return Err(StorageError::backend(std::io::Error::other(format!("injected failure for {key}")))),
            Some(Fault::Panic) => panic!("injected panic for {key}"),
            None => {}
        }
        Ok(())
    }

    fn record(&self, kind: &'static str, key: &str, document: Option<&Document>) {
        let document = document.map(|d| Value::Object(d.fields().clone()));
        self.journal.record(Write { collection: self.inner.name().to_owned(), kind, key: key.to_owned(), document });
    }
}

#[async_trait]
impl DocumentCollection for FaultyCollection {
    fn name(&self) -> &str { self.inner.name() }

    async fn insert_one(&self, document: Document) -> Result<PrimaryKey, StorageError> {
        let requested = document.key()?.map(|k| k.to_string()).unwrap_or_default();
        self.apply_fault(&requested).await?;
        let snapshot = document.clone();
        let key = self.inner.insert_one(document).await?;
        self.record("insert", key.as_str(), Some(&snapshot));
        Ok(key)
    }

    async fn replace_one(&self, key: &PrimaryKey, document: Document) -> Result<bool, StorageError> {
        self.apply_fault(key.as_str()).await?;
        let snapshot = document.clone();
        let matched = self.inner.replace_one(key, document).await?;
        self.record("replace", key.as_str(), Some(&snapshot));
        Ok(matched)
    }

    async fn delete_one(&self, key: &PrimaryKey) -> Result<bool, StorageError> {
        self.apply_fault(key.as_str()).await?;
        let matched = self.inner.delete_one(key).await?;
        self.record("delete", key.as_str(), None);
        Ok(matched)
    }

    async fn find_one(&self, key: &PrimaryKey) -> Result<Option<Document>, StorageError> { self.inner.find_one(key).await }

    async fn count(&self) -> Result<usize, StorageError> { self.inner.count().await }

    async fn delete_many(&self) -> Result<usize, StorageError> { self.inner.delete_many().await }

    fn find_all(&self) -> DocumentStream { self.inner.find_all() }
}

/// People and trips mirrored into two collections through one shared queue.
pub struct World {
    pub people: Repository<Person>,
    pub trips: Repository<Trip>,
    pub people_collection: Arc<FaultyCollection>,
    pub trips_collection: Arc<FaultyCollection>,
    pub journal: Journal,
    pub queue: TaskQueue,
}

#[allow(unused)]
impl World {
    /// In-memory store, fail-stop queue, listeners attached
    pub async fn new() -> anyhow::Result<Self> {
        let world = Self::detached(&MemoryDocumentStore::new(), QueueConfig::fail_stop()).await?;
        world.attach();
        Ok(world)
    }

    /// Repositories are left without listeners, ready to be filled
    pub async fn detached(store: &dyn DocumentStore, config: QueueConfig) -> anyhow::Result<Self> {
        let journal = Journal::default();
        let people_collection = Arc::new(FaultyCollection::new(store.collection("people").await?, journal.clone()));
        let trips_collection = Arc::new(FaultyCollection::new(store.collection("trips").await?, journal.clone()));
        Ok(Self {
            people: Repository::new("people"),
            trips: Repository::new("trips"),
            people_collection,
            trips_collection,
            journal,
            queue: TaskQueue::new(config)?,
        })
    }

    pub fn person_codec(&self) -> Arc<dyn EntitySerializer<Person>> {
        Arc::new(PersonCodec { people: self.people.downgrade(), trips: self.trips.downgrade() })
    }

    pub fn trip_codec(&self) -> Arc<dyn EntitySerializer<Trip>> { Arc::new(TripCodec { people: self.people.downgrade() }) }

    pub fn attach(&self) {
        let people: Arc<dyn EntityEventListener<Person>> =
            Arc::new(PersistenceLayer::new(CollectionHandle::new(self.people_collection.clone()), self.person_codec(), self.queue.clone()));
        let trips: Arc<dyn EntityEventListener<Trip>> =
            Arc::new(PersistenceLayer::new(CollectionHandle::new(self.trips_collection.clone()), self.trip_codec(), self.queue.clone()));
        self.people.register_listener(people);
        self.trips.register_listener(trips);
    }

    /// Fill people, then trips. Returns the counts loaded.
    pub async fn fill(&self) -> Result<(usize, usize), FillError> {
        let people = RepositoryFiller::new(self.person_codec(), CollectionHandle::new(self.people_collection.clone()));
        let trips = RepositoryFiller::new(self.trip_codec(), CollectionHandle::new(self.trips_collection.clone()));
        Ok((people.fill_repository(&self.people).await?, trips.fill_repository(&self.trips).await?))
    }

    pub fn person(&self, name: &str) -> Entity<Person> { self.people.create_entity(Person::new(&self.people, &self.trips, name)) }

    pub fn person_with_id(&self, id: &str, name: &str) -> Entity<Person> {
        self.people.create_entity_with_id(Person::new(&self.people, &self.trips, name), id.into()).unwrap()
    }

    pub fn trip(&self, location: &str) -> Entity<Trip> { self.trips.create_entity(Trip::new(&self.people, location)) }

    pub fn trip_with_id(&self, id: &str, location: &str) -> Entity<Trip> {
        self.trips.create_entity_with_id(Trip::new(&self.people, location), id.into()).unwrap()
    }
}

/// Every document of a collection as JSON, in cursor order
#[allow(unused)]
pub async fn documents(collection: &dyn DocumentCollection) -> anyhow::Result<Vec<Value>> {
    let documents: Vec<Document> = collection.find_all().try_collect().await?;
    Ok(documents.into_iter().map(|d| Value::Object(d.into_fields())).collect())
}

#[allow(unused)]
pub async fn stored(collection: &dyn DocumentCollection, id: &EntityId) -> anyhow::Result<Option<Value>> {
    Ok(collection.find_one(&PrimaryKey::from(id)).await?.map(|d| Value::Object(d.into_fields())))
}

#[allow(unused)]
pub fn ids<T>(entities: &[Entity<T>]) -> Vec<EntityId> { entities.iter().map(|e| e.id().clone()).collect() }
